// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: this layer decides the order in
// which data, model, checkpoint and telemetry components run, but
// does none of their work itself.
//
//   orchestrator     — the epoch state machine and selection policy
//   train_use_case   — fresh runs and learning-rate sweeps
//   resume_use_case  — eval, explain and retrain from a run directory
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The epoch loop shared by train and retrain
pub mod orchestrator;

// Fresh training runs
pub mod train_use_case;

// Workflows that start from an existing checkpoint
pub mod resume_use_case;
