// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Typed failures the control loop can surface. Everything else
// travels as anyhow::Error with context attached at the call site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    /// A resumed log names an architecture with no registered constructor.
    #[error("unknown architecture '{name}' (known: {known})")]
    ConfigMismatch { name: String, known: String },

    /// Checkpoint and log disagree, or stored weights do not fit the model.
    #[error("corrupt artifact at {path}: {reason}")]
    CorruptArtifact { path: String, reason: String },

    /// Model and batch tensors live on different compute devices.
    #[error("device mismatch: model on {model}, batch on {batch}")]
    DeviceMismatch { model: String, batch: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}

impl TrainError {
    pub fn corrupt(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        TrainError::CorruptArtifact {
            path:   path.to_string(),
            reason: reason.into(),
        }
    }
}
