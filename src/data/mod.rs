// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from dataset files on disk to device-ready batches.
//
//   <data_dir>/<dataset>/*.jsonl
//       │
//       ▼
//   JsonlLoader       → utterances + label set
//       │
//       ▼
//   split_train_val   → seeded validation carve-out (if needed)
//       │
//       ▼
//   Preprocessor      → `_comma_` unescaping, whitespace cleanup
//       │
//       ▼
//   Tokenizer         → word-level token ids
//       │
//       ▼
//   EmotionDataset    → Burn Dataset of padded samples
//       │
//       ▼
//   EmotionBatcher    → tensor batches
//       │
//       ▼
//   JsonlProvider     → DataBundle of train / valid / test streams
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads .jsonl splits and labels.txt
pub mod loader;

/// Cleans utterance text
pub mod preprocessor;

/// Padded samples and Burn's Dataset trait
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/validation carve-out
pub mod splitter;

/// GloVe-style pretrained vectors
pub mod embeddings;

/// DataProvider trait and the JSONL implementation
pub mod provider;
