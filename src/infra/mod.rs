// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Files a run reads and writes, outside the model maths:
//
//   checkpoint.rs      — rolling and best checkpoint slots, the run
//                        log, and Burn record (de)serialisation via
//                        CompactRecorder
//
//   tokenizer_store.rs — word-level tokenizer, built from the
//                        training split or loaded from disk
//
//   metrics.rs         — per-epoch telemetry CSV
//
//   explanations.rs    — explain-mode JSONL writer
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint slots, run log, record I/O
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// JSONL sink for explain mode
pub mod explanations;
