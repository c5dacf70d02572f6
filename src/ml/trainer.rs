// ============================================================
// Layer 5 — Epoch Trainer
// ============================================================
// One pass over the training stream with dropout active.
//
// Per accepted batch:
//   forward → cross-entropy → backward → Adam step
// Gradient clipping (±grad_clip per element) is configured on the
// optimizer, so it applies inside `optim.step` before the update.
//
// Batches whose size differs from batch_size (the ragged tail of
// the epoch) are skipped and left out of the averages.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::provider::Stream;
use crate::domain::{
    config::RunConfig,
    metrics::{BatchAverager, EpochStats},
};
use crate::ml::input::{ensure_same_device, place_batch, InputShape};
use crate::ml::model::EmotionClassifier;

/// Adam with per-element gradient clamping at ±`grad_clip`.
///
/// m = β1*m + (1-β1)*g        (mean)
/// v = β2*v + (1-β2)*g²       (variance)
/// θ = θ - lr * m / (√v + ε)  (update)
pub fn adam(config: &RunConfig) -> AdamConfig {
    AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Value(config.grad_clip as f32)))
}

/// Device the model's parameters live on, or `fallback` for a
/// parameterless module.
pub fn model_device<B: Backend, M: Module<B>>(model: &M, fallback: &B::Device) -> B::Device {
    model.devices().into_iter().next().unwrap_or_else(|| fallback.clone())
}

/// Correct predictions in a batch: argmax(logits) == label.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]; flatten before comparing with [batch]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted.equal(labels).int().sum().into_scalar().elem::<i64>();
    correct.max(0) as usize
}

#[allow(clippy::too_many_arguments)]
pub fn train_one_epoch<B, M, O>(
    model:         &mut M,
    optim:         &mut O,
    loader:        &Stream<B>,
    config:        &RunConfig,
    shape:         InputShape,
    device:        &B::Device,
    epoch:         usize,
    learning_rate: f64,
) -> Result<EpochStats>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + EmotionClassifier<B>,
    O: Optimizer<M, B>,
{
    let ce = CrossEntropyLossConfig::new().init(device);
    let mut averager = BatchAverager::new();
    let mut skipped = 0usize;

    for (step, batch) in loader.iter().enumerate() {
        if batch.len() != config.batch_size {
            tracing::debug!("Skipping batch {} of size {} (batch_size {})", step, batch.len(), config.batch_size);
            skipped += 1;
            continue;
        }

        let placed = place_batch(batch, shape, device)?;
        ensure_same_device(&model_device(&*model, device), &placed)?;

        let logits = model.logits(placed.input, placed.attention_mask);
        let loss = ce.forward(logits.clone(), placed.labels.clone());

        let accuracy = 100.0 * count_correct(logits, placed.labels) as f64 / config.batch_size as f64;
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + clipped Adam update
        let grads = GradientsParams::from_grads(loss.backward(), &*model);
        *model = optim.step(learning_rate, model.clone(), grads);

        averager.add(loss_val, accuracy);

        if config.log_every > 0 && (step + 1) % config.log_every == 0 {
            tracing::info!(
                "Epoch: {}, Idx: {}, Training Loss: {:.4}, Training Accuracy: {:.2}%",
                epoch + 1,
                step + 1,
                loss_val,
                accuracy
            );
        }
    }

    if skipped > 0 {
        tracing::debug!("Epoch {}: skipped {} ragged batch(es)", epoch + 1, skipped);
    }
    if averager.batches() == 0 {
        tracing::warn!(
            "Epoch {}: no batch of size {} in the training split, weights unchanged",
            epoch + 1,
            config.batch_size
        );
    }
    Ok(averager.stats())
}
