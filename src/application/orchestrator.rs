// ============================================================
// Layer 2 — Training Orchestrator
// ============================================================
// Drives an EpochEngine through the run state machine:
//
//   Init ─▶ EpochRunning ─▶ Evaluating ─▶ Checkpointing ─┬─▶ EpochRunning
//                                                         ├─▶ EarlyStopped
//                                                         └─▶ Completed
//
// Per epoch:
//   1. train one epoch at the scheduled learning rate
//   2. evaluate valid, then test, on the same weights
//   3. rolling checkpoint always; on a new best validation accuracy,
//      promote it to the best slot and rewrite log.json
//   4. append telemetry, step the schedule, decide whether to stop
//
// Only validation accuracy reaches the selection rule. Test metrics
// are recorded in the log and nowhere else.

use anyhow::{Context, Result};

use crate::domain::{
    config::RunConfig,
    metrics::{EpochStats, EvalSummary},
    run_log::{BestEpoch, RunLog},
    run_state::{Phase, RunState, StepDecay},
    traits::{EpochEngine, Split},
};
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointMeta},
    metrics::{EpochTelemetry, MetricsLogger},
};

/// What a finished run looked like. Epoch indices are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub phase:          Phase,
    pub epochs_run:     usize,
    pub best_epoch:     Option<usize>,
    pub best_valid_acc: f64,
    /// Number of times log.json was (re)written during this run
    pub log_writes:     usize,
    pub last_epoch:     Option<usize>,
}

pub struct Orchestrator<'a> {
    config:      &'a RunConfig,
    checkpoints: &'a CheckpointManager,
    telemetry:   MetricsLogger,
    state:       RunState,
    note:        String,
}

impl<'a> Orchestrator<'a> {
    /// Fresh lineage starting at `config.start_epoch`.
    pub fn new(config: &'a RunConfig, checkpoints: &'a CheckpointManager) -> Result<Self> {
        Self::with_state(config, checkpoints, RunState::new(config.start_epoch))
    }

    /// Continue a lineage whose best validation accuracy is already logged.
    pub fn resumed(
        config:      &'a RunConfig,
        checkpoints: &'a CheckpointManager,
        best_acc:    f64,
        best_epoch:  Option<usize>,
    ) -> Result<Self> {
        Self::with_state(
            config,
            checkpoints,
            RunState::resumed(config.start_epoch, best_acc, best_epoch),
        )
    }

    fn with_state(config: &'a RunConfig, checkpoints: &'a CheckpointManager, state: RunState) -> Result<Self> {
        let telemetry = MetricsLogger::new(checkpoints.dir())?;
        let overlap = telemetry.logged_epochs()?.into_iter().filter(|&e| e >= state.epoch).count();
        if overlap > 0 {
            tracing::warn!(
                "'{}' already holds {} rows from epoch {} on; new rows are appended after them",
                telemetry.csv_path().display(),
                overlap,
                state.epoch
            );
        }
        Ok(Self { config, checkpoints, telemetry, state, note: String::new() })
    }

    /// Free-text note stored with every log write.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn run<E: EpochEngine + ?Sized>(&mut self, engine: &mut E) -> Result<RunSummary> {
        let cfg = self.config;
        let mut schedule = StepDecay::from_config(cfg);
        let mut summary = RunSummary {
            phase:          Phase::Init,
            epochs_run:     0,
            best_epoch:     self.state.best_epoch,
            best_valid_acc: self.state.best_acc,
            log_writes:     0,
            last_epoch:     None,
        };

        if self.state.epoch >= cfg.nepoch {
            tracing::warn!(
                "Nothing to run: start epoch {} is not below nepoch {}",
                self.state.epoch,
                cfg.nepoch
            );
            self.state.enter(Phase::Completed);
            summary.phase = Phase::Completed;
            return Ok(summary);
        }

        tracing::info!(
            "Training '{}' for epochs {}..{} in '{}'",
            cfg.arch_name,
            self.state.epoch,
            cfg.nepoch,
            self.checkpoints.dir().display()
        );

        let mut last_log: Option<RunLog> = None;
        loop {
            let epoch = self.state.epoch;
            let learning_rate = schedule.current();

            self.state.enter(Phase::EpochRunning);
            let train = engine
                .train_epoch(epoch, learning_rate)
                .with_context(|| format!("Training failed in epoch {epoch}"))?;

            self.state.enter(Phase::Evaluating);
            let valid = engine.evaluate(Split::Valid)?;
            let test = engine.evaluate(Split::Test)?;

            self.state.enter(Phase::Checkpointing);
            let decision = self.state.observe(valid.accuracy);
            self.checkpoints.save_rolling(
                &*engine,
                &CheckpointMeta {
                    epoch:      Some(epoch + 1),
                    arch:       cfg.arch_name.clone(),
                    train_acc:  train.accuracy,
                    valid_acc:  valid.accuracy,
                    num_params: engine.num_params(),
                },
            )?;
            if decision.is_best {
                self.checkpoints.promote_best()?;
                let log = RunLog::new(
                    cfg.clone(),
                    BestEpoch::from_epoch(epoch, &train, &valid, &test, &self.note),
                );
                self.checkpoints.write_log(&log)?;
                summary.log_writes += 1;
                last_log = Some(log);
            }

            self.telemetry.log(&EpochTelemetry {
                epoch,
                train_loss: train.loss,
                valid_loss: valid.loss,
                train_acc: train.accuracy,
                valid_acc: valid.accuracy,
                learning_rate,
            })?;
            print_epoch(epoch, cfg.nepoch, learning_rate, &train, &valid, &test, decision.is_best);

            schedule.step();
            summary.epochs_run += 1;
            summary.last_epoch = Some(epoch);

            if let Some(phase) = self.state.stop_phase(cfg) {
                if phase == Phase::EarlyStopped {
                    tracing::info!(
                        "Early stop after epoch {}: no improvement for {} epochs",
                        epoch,
                        self.state.patience_counter
                    );
                }
                self.state.enter(phase);
                break;
            }
            self.state.advance();
        }

        summary.phase = self.state.phase;
        summary.best_epoch = self.state.best_epoch;
        summary.best_valid_acc = self.state.best_acc;

        match &last_log {
            Some(log) => tracing::info!(
                "Best epoch {}: valid_acc={:.2}% test_acc={:.2}% test_f1={:.4}",
                log.best.epoch,
                log.best.valid_acc,
                log.best.test_acc,
                log.best.test_f1_score
            ),
            None => tracing::info!(
                "No epoch beat the best validation accuracy of {:.2}%",
                self.state.best_acc
            ),
        }
        Ok(summary)
    }
}

fn print_epoch(
    epoch:   usize,
    nepoch:  usize,
    lr:      f64,
    train:   &EpochStats,
    valid:   &EvalSummary,
    test:    &EvalSummary,
    is_best: bool,
) {
    println!(
        "Epoch {:>3}/{} | lr={:.2e} | train_loss={:.4} train_acc={:.2}% | valid_loss={:.4} valid_acc={:.2}% | test_acc={:.2}% test_f1={:.4}{}",
        epoch + 1,
        nepoch,
        lr,
        train.loss,
        train.accuracy,
        valid.loss,
        valid.accuracy,
        test.accuracy,
        test.macro_f1,
        if is_best { " *" } else { "" },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::CheckpointManager;
    use std::{fs, path::Path};

    /// Replays fixed per-epoch accuracies, indexed by absolute epoch.
    struct Scripted {
        valid:   Vec<f64>,
        test:    Vec<f64>,
        current: usize,
        rates:   Vec<f64>,
    }

    impl Scripted {
        fn new(valid: &[f64]) -> Self {
            Self::with_test(valid, &vec![50.0; valid.len()])
        }

        fn with_test(valid: &[f64], test: &[f64]) -> Self {
            Self { valid: valid.to_vec(), test: test.to_vec(), current: 0, rates: Vec::new() }
        }
    }

    impl EpochEngine for Scripted {
        fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochStats> {
            self.current = epoch;
            self.rates.push(learning_rate);
            Ok(EpochStats { loss: 1.0 / (epoch + 1) as f64, accuracy: 10.0 * epoch as f64, batches: 1 })
        }

        fn evaluate(&mut self, split: Split) -> Result<EvalSummary> {
            let accuracy = match split {
                Split::Valid => self.valid[self.current],
                Split::Test => self.test[self.current],
            };
            Ok(EvalSummary { accuracy, loss: 1.0, ..EvalSummary::default() })
        }

        fn save_weights(&self, model: &Path, optim: &Path) -> Result<()> {
            fs::write(model.with_extension("mpk.gz"), format!("epoch {}", self.current))?;
            fs::write(optim.with_extension("mpk.gz"), "optim")?;
            Ok(())
        }

        fn num_params(&self) -> usize {
            42
        }
    }

    fn config(nepoch: usize, patience: usize) -> RunConfig {
        RunConfig { nepoch, patience, arch_name: "rcnn".into(), ..RunConfig::default() }
    }

    #[test]
    fn two_log_writes_for_sixty_fifty_five_seventy() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let cfg = config(3, 30);

        let summary = Orchestrator::new(&cfg, &mgr).unwrap().run(&mut Scripted::new(&[60.0, 55.0, 70.0])).unwrap();

        assert_eq!(summary.log_writes, 2);
        assert_eq!(summary.phase, Phase::Completed);
        assert_eq!(summary.epochs_run, 3);
        let log = mgr.read_log().unwrap();
        assert_eq!(log.best.valid_acc, 70.0);
        assert_eq!(log.best.epoch, 3);
        assert_eq!(fs::read_to_string(mgr.best_slot().model_file()).unwrap(), "epoch 2");
        assert_eq!(mgr.read_meta(&mgr.rolling_slot()).unwrap().epoch, Some(3));
    }

    #[test]
    fn logged_best_only_ever_improves() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let accs = [40.0, 52.0, 51.0, 52.0, 63.0, 10.0, 63.5];
        let cfg = config(accs.len(), 30);

        let summary = Orchestrator::new(&cfg, &mgr).unwrap().run(&mut Scripted::new(&accs)).unwrap();

        // strict prefix maxima: 40, 52, 63, 63.5
        assert_eq!(summary.log_writes, 4);
        assert_eq!(summary.best_epoch, Some(6));
        assert_eq!(mgr.read_log().unwrap().best.valid_acc, 63.5);
    }

    #[test]
    fn test_accuracy_never_changes_selection() {
        let valid = [50.0, 45.0, 60.0, 58.0];
        let cfg = config(valid.len(), 30);

        let run = |test: &[f64]| {
            let tmp = tempfile::tempdir().unwrap();
            let mgr = CheckpointManager::new(tmp.path()).unwrap();
            let summary = Orchestrator::new(&cfg, &mgr)
                .unwrap()
                .run(&mut Scripted::with_test(&valid, test))
                .unwrap();
            (summary.best_epoch, summary.log_writes, mgr.read_log().unwrap().best.test_acc)
        };

        let (best_a, writes_a, test_a) = run(&[10.0, 99.0, 20.0, 99.0]);
        let (best_b, writes_b, test_b) = run(&[90.0, 1.0, 80.0, 1.0]);
        assert_eq!((best_a, writes_a), (best_b, writes_b));
        assert_eq!(best_a, Some(2));
        assert_eq!((test_a, test_b), (20.0, 80.0));
    }

    #[test]
    fn early_stop_lands_patience_epochs_after_best() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let cfg = config(100, 3);

        let summary = Orchestrator::new(&cfg, &mgr)
            .unwrap()
            .run(&mut Scripted::new(&[50.0, 70.0, 60.0, 65.0, 69.0, 80.0]))
            .unwrap();

        assert_eq!(summary.phase, Phase::EarlyStopped);
        assert_eq!(summary.best_epoch, Some(1));
        assert_eq!(summary.last_epoch, Some(4));
        assert_eq!(summary.epochs_run, 5);
    }

    #[test]
    fn learning_rate_follows_step_decay() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let cfg = RunConfig { learning_rate: 1.0, lr_gamma: 0.5, step_size: Some(2), ..config(5, 30) };
        let mut engine = Scripted::new(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        Orchestrator::new(&cfg, &mgr).unwrap().run(&mut engine).unwrap();
        assert_eq!(engine.rates, vec![1.0, 1.0, 0.5, 0.5, 0.25]);

        let telemetry = MetricsLogger::new(tmp.path()).unwrap();
        assert_eq!(telemetry.logged_epochs().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn resuming_matches_an_uninterrupted_run() {
        let accs = [30.0, 55.0, 50.0, 61.0, 58.0];
        let base = RunConfig { learning_rate: 1.0, lr_gamma: 0.5, step_size: Some(2), ..config(accs.len(), 30) };

        let straight = tempfile::tempdir().unwrap();
        let straight_mgr = CheckpointManager::new(straight.path()).unwrap();
        let mut straight_engine = Scripted::new(&accs);
        Orchestrator::new(&base, &straight_mgr).unwrap().run(&mut straight_engine).unwrap();

        let split = tempfile::tempdir().unwrap();
        let split_mgr = CheckpointManager::new(split.path()).unwrap();
        let first = RunConfig { nepoch: 3, ..base.clone() };
        let mut engine = Scripted::new(&accs);
        let head = Orchestrator::new(&first, &split_mgr).unwrap().run(&mut engine).unwrap();

        let start = split_mgr.read_meta(&split_mgr.rolling_slot()).unwrap().epoch.unwrap();
        assert_eq!(start, 3);
        let second = RunConfig { start_epoch: start, ..base.clone() };
        let tail = Orchestrator::resumed(&second, &split_mgr, head.best_valid_acc, head.best_epoch)
            .unwrap()
            .run(&mut engine)
            .unwrap();

        assert_eq!(tail.epochs_run, 2);
        assert_eq!(engine.rates, straight_engine.rates);
        assert_eq!(split_mgr.read_log().unwrap().best, straight_mgr.read_log().unwrap().best);
    }

    #[test]
    fn resumed_run_without_improvement_leaves_the_log_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let cfg = RunConfig { start_epoch: 2, ..config(4, 30) };

        let summary = Orchestrator::resumed(&cfg, &mgr, 90.0, Some(1))
            .unwrap()
            .run(&mut Scripted::new(&[0.0, 90.0, 80.0, 85.0]))
            .unwrap();

        assert_eq!(summary.log_writes, 0);
        assert_eq!(summary.best_epoch, Some(1));
        assert!(!mgr.log_path().exists());
    }

    #[test]
    fn start_past_nepoch_runs_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path()).unwrap();
        let cfg = RunConfig { start_epoch: 5, ..config(5, 30) };
        let mut engine = Scripted::new(&[]);

        let summary = Orchestrator::new(&cfg, &mgr).unwrap().run(&mut engine).unwrap();
        assert_eq!(summary.phase, Phase::Completed);
        assert_eq!(summary.epochs_run, 0);
        assert!(engine.rates.is_empty());
    }
}
