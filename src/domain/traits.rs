// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between the control loop and the components it drives.
//
//   EpochEngine — one model + optimizer + data splits. The burn
//                 session in the ml layer implements it; tests use
//                 scripted engines.
//   Explainer   — receives per-batch predictions in explain mode.

use anyhow::Result;
use std::path::Path;

use crate::domain::metrics::{EpochStats, EvalSummary};

/// Which split an evaluation pass runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Valid,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

/// Everything the orchestrator needs from a trainable model.
pub trait EpochEngine {
    /// One full pass over the training split at the given learning rate.
    /// `epoch` is zero-based.
    fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochStats>;

    /// Inference-mode pass over `split` using the current weights.
    fn evaluate(&mut self, split: Split) -> Result<EvalSummary>;

    /// Persist model and optimizer state. Paths are stems; the
    /// recorder chooses the extension.
    fn save_weights(&self, model_stem: &Path, optim_stem: &Path) -> Result<()>;

    /// Parameter count of the model, stored with each checkpoint.
    fn num_params(&self) -> usize;
}

/// Host-side copy of one batch handed to an explainer.
#[derive(Debug, Clone)]
pub struct ExplainBatch {
    pub texts:         Vec<String>,
    pub labels:        Vec<usize>,
    pub predictions:   Vec<usize>,
    /// Softmax over classes, one row per example
    pub probabilities: Vec<Vec<f32>>,
}

pub trait Explainer {
    fn explain(&mut self, batch: &ExplainBatch) -> Result<()>;
}
