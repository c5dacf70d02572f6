// ============================================================
// Layer 3 — Run State and Model-Selection Policy
// ============================================================
// The mutable state owned by the Training Orchestrator, plus the
// two pure decisions it makes every epoch:
//
//   is_best   — validation accuracy strictly above the best so far
//   stop?     — patience exhausted, or last configured epoch reached
//
// Only validation accuracy enters `observe`; test metrics have no
// path into the selection decision.
//
// Phases:
//
//   Init ─▶ EpochRunning ─▶ Evaluating ─▶ Checkpointing ─┬─▶ EpochRunning
//                                                         ├─▶ EarlyStopped
//                                                         └─▶ Completed

use crate::domain::config::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    EpochRunning,
    Evaluating,
    Checkpointing,
    EarlyStopped,
    Completed,
}

/// Outcome of the Checkpointing decision for one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochDecision {
    pub is_best:          bool,
    pub patience_counter: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub phase:            Phase,
    /// Zero-based index of the epoch being run
    pub epoch:            usize,
    pub best_acc:         f64,
    /// Zero-based index of the best epoch, if any epoch of this lineage improved
    pub best_epoch:       Option<usize>,
    pub patience_counter: usize,
}

impl RunState {
    /// Fresh run: nothing seen yet.
    pub fn new(start_epoch: usize) -> Self {
        Self {
            phase:            Phase::Init,
            epoch:            start_epoch,
            best_acc:         0.0,
            best_epoch:       None,
            patience_counter: 0,
        }
    }

    /// Continue a lineage whose best validation accuracy is already on disk.
    /// `best_epoch` is zero-based.
    pub fn resumed(start_epoch: usize, best_acc: f64, best_epoch: Option<usize>) -> Self {
        Self { best_acc, best_epoch, ..Self::new(start_epoch) }
    }

    pub fn enter(&mut self, phase: Phase) {
        tracing::debug!("epoch {}: {:?} -> {:?}", self.epoch, self.phase, phase);
        self.phase = phase;
    }

    /// Apply the model-selection rule for the current epoch.
    pub fn observe(&mut self, valid_acc: f64) -> EpochDecision {
        let is_best = valid_acc > self.best_acc;
        if is_best {
            self.best_acc = valid_acc;
            self.best_epoch = Some(self.epoch);
            self.patience_counter = 0;
        } else {
            self.patience_counter += 1;
        }
        EpochDecision { is_best, patience_counter: self.patience_counter }
    }

    /// Terminal phase to enter after the current epoch, if any.
    ///
    /// Patience uses exact equality: the counter grows by one per epoch,
    /// so it meets `patience` exactly once before any overshoot.
    pub fn stop_phase(&self, config: &RunConfig) -> Option<Phase> {
        if self.patience_counter == config.patience {
            Some(Phase::EarlyStopped)
        } else if self.epoch + 1 >= config.nepoch {
            Some(Phase::Completed)
        } else {
            None
        }
    }

    pub fn advance(&mut self) {
        self.epoch += 1;
    }
}

/// Step decay: the rate is multiplied by `gamma` every `step_size` epochs.
///
/// The rate is a function of the absolute epoch index, so a resumed
/// run continues the schedule where the checkpoint left it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecay {
    base:      f64,
    gamma:     f64,
    step_size: Option<usize>,
    epoch:     usize,
}

impl StepDecay {
    pub fn new(base: f64, gamma: f64, step_size: Option<usize>, epoch: usize) -> Self {
        Self { base, gamma, step_size, epoch }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.learning_rate, config.lr_gamma, config.step_size, config.start_epoch)
    }

    pub fn current(&self) -> f64 {
        match self.step_size {
            Some(step) if step > 0 => self.base * self.gamma.powi((self.epoch / step) as i32),
            _ => self.base,
        }
    }

    pub fn step(&mut self) {
        self.epoch += 1;
    }
}
