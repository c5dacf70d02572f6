// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define the run: its
// configuration, the selection policy, the durable log format,
// the metric maths and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, traits and pure functions

/// Immutable run configuration
pub mod config;

/// Typed failures of the control loop
pub mod error;

/// Emotion name <-> class index map
pub mod labels;

/// Confusion matrix, F1, top-k, batch averaging
pub mod metrics;

/// Best-epoch log persisted next to the best checkpoint
pub mod run_log;

/// Run state, selection policy and learning-rate schedule
pub mod run_state;

/// Seams: EpochEngine, Explainer
pub mod traits;

/// A labelled conversation turn
pub mod utterance;
