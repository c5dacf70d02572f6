// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs one training lineage end to end, or a learning-rate sweep
// of several:
//
//   Step 1: Validate the configuration      (Layer 3 - domain)
//   Step 2: Load, tokenise and batch data   (Layer 4 - data)
//   Step 3: Create a fresh run directory    (Layer 6 - infra)
//   Step 4: Build the model and optimizer   (Layer 5 - ml)
//   Step 5: Drive the epochs                (Layer 2 - orchestrator)
//
// Each sweep entry is a full, independently seeded run in its own
// directory, noted as `Tuning learning_rate:<lr>`.
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::orchestrator::{Orchestrator, RunSummary};
use crate::data::provider::{DataProvider, JsonlProvider};
use crate::domain::config::RunConfig;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::session::open_session;

/// Where a finished run lives and how it ended.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_dir: PathBuf,
    pub summary: RunSummary,
}

pub struct TrainUseCase {
    config:  RunConfig,
    note:    String,
    tune_lr: Vec<f64>,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config, note: String::new(), tune_lr: Vec::new() }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Replace the single run with one run per learning rate.
    pub fn with_lr_sweep(mut self, rates: Vec<f64>) -> Self {
        self.tune_lr = rates;
        self
    }

    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<Vec<TrainOutcome>> {
        if self.tune_lr.is_empty() {
            return Ok(vec![train_once::<B>(&self.config, &self.note, device)?]);
        }

        let mut outcomes = Vec::with_capacity(self.tune_lr.len());
        for &lr in &self.tune_lr {
            let config = RunConfig { learning_rate: lr, ..self.config.clone() };
            let note = format!("Tuning learning_rate:{lr}");
            tracing::info!("{note}");
            let outcome = train_once::<B>(&config, &note, device)
                .with_context(|| format!("Sweep run with learning_rate {lr} failed"))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn train_once<B: AutodiffBackend>(config: &RunConfig, note: &str, device: &B::Device) -> Result<TrainOutcome> {
    // ── Step 1: Validate ─────────────────────────────────────────────────────
    config.validate()?;

    // ── Step 2: Data ─────────────────────────────────────────────────────────
    let data = JsonlProvider.load::<B>(config, device)?;

    // ── Step 3: Run directory ────────────────────────────────────────────────
    let checkpoints = CheckpointManager::for_new_run(config)?;

    // ── Steps 4–5: Model, optimizer, epochs ──────────────────────────────────
    let summary = open_session::<B, _>(config, data, device, None, |session| {
        Orchestrator::new(config, &checkpoints)?
            .with_note(note)
            .run(session)
    })?;

    Ok(TrainOutcome { run_dir: checkpoints.dir().to_path_buf(), summary })
}
