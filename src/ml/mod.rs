// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Burn-specific code of the control loop: models, the epoch
// trainer, the metric evaluator, resume and the session that binds
// them into an EpochEngine.
//
//   input.rs     — InputShape / ModelInput, single device placement
//   model/       — EmotionClassifier, Architecture registry,
//                  rcnn / transformer / sl_transformer
//   trainer.rs   — one training epoch (Adam + gradient clipping)
//   evaluator.rs — inference-mode metrics and explain passes
//   resume.rs    — ResumePlan: locate, verify, restore
//   session.rs   — BurnSession implementing EpochEngine
//
// Training runs on `TrainBackend` (autodiff); evaluation runs on
// its inner backend through `model.valid()`.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Input shapes and device placement
pub mod input;

/// Classifier architectures and their registry
pub mod model;

/// One epoch of training
pub mod trainer;

/// Metrics and explanation passes
pub mod evaluator;

/// Resume from a checkpoint directory
pub mod resume;

/// Model + optimizer + data behind the EpochEngine seam
pub mod session;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type TrainDevice = burn::backend::wgpu::WgpuDevice;
