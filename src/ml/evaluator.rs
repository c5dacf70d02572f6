// ============================================================
// Layer 5 — Metric Evaluator
// ============================================================
// Inference-mode pass over one split. The caller hands in the
// `valid()` copy of the model (inner backend, no autodiff graph,
// dropout disabled).
//
//   Metrics  → EvalSummary { loss, accuracy, macro/weighted F1, top-k }
//   Explain  → per-batch texts, labels, predictions and softmax rows
//              go to the Explainer; nothing is accumulated
//
// Logits are copied to host memory once per batch; every metric is
// computed from that copy by the domain metric functions.

use anyhow::Result;
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

use crate::data::provider::Stream;
use crate::domain::{
    config::RunConfig,
    labels::LabelSet,
    metrics::{argmax, in_top_k, softmax, BatchAverager, ConfusionMatrix, EvalSummary},
    traits::{ExplainBatch, Explainer},
};
use crate::ml::input::{ensure_same_device, place_batch, InputShape};
use crate::ml::model::EmotionClassifier;
use crate::ml::trainer::model_device;

pub enum EvalMode<'a> {
    Metrics,
    Explain(&'a mut dyn Explainer),
}

pub struct EvalContext<'a, B: Backend> {
    pub config: &'a RunConfig,
    pub shape:  InputShape,
    pub labels: &'a LabelSet,
    pub device: &'a B::Device,
}

pub fn evaluate<B, M>(
    model:  &M,
    loader: &Stream<B>,
    ctx:    &EvalContext<'_, B>,
    mut mode: EvalMode<'_>,
) -> Result<Option<EvalSummary>>
where
    B: Backend,
    M: Module<B> + EmotionClassifier<B>,
{
    let cfg = ctx.config;
    let ce = CrossEntropyLossConfig::new().init(ctx.device);
    let device = model_device(model, ctx.device);

    let mut averager = BatchAverager::new();
    let mut confusion = ConfusionMatrix::new(cfg.output_size);
    let mut top_k_hits = 0usize;
    let mut seen = 0usize;

    for (idx, batch) in loader.iter().enumerate() {
        if batch.len() != cfg.batch_size {
            tracing::debug!("Skipping eval batch {} of size {}", idx, batch.len());
            continue;
        }

        let placed = place_batch(batch, ctx.shape, ctx.device)?;
        ensure_same_device(&device, &placed)?;

        let labels: Vec<usize> = placed
            .labels
            .clone()
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("Cannot read labels: {e:?}"))?
            .into_iter()
            .map(|l| l.max(0) as usize)
            .collect();

        let logits = model.logits(placed.input, placed.attention_mask);
        let [rows, classes] = logits.dims();
        let host: Vec<f32> = logits
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read logits: {e:?}"))?;
        let host_rows: Vec<&[f32]> = host.chunks(classes.max(1)).take(rows).collect();
        let predictions: Vec<usize> = host_rows.iter().map(|r| argmax(r)).collect();

        match &mut mode {
            EvalMode::Explain(explainer) => {
                explainer.explain(&ExplainBatch {
                    texts:         placed.texts,
                    labels,
                    predictions,
                    probabilities: host_rows.iter().map(|r| softmax(r)).collect(),
                })?;
            }
            EvalMode::Metrics => {
                let loss: f64 = ce.forward(logits, placed.labels).into_scalar().elem::<f64>();
                let mut correct = 0usize;
                for ((row, &truth), &pred) in host_rows.iter().zip(&labels).zip(&predictions) {
                    confusion.record(truth, pred);
                    if truth == pred {
                        correct += 1;
                    }
                    if in_top_k(row, truth, cfg.top_k) {
                        top_k_hits += 1;
                    }
                }
                seen += labels.len();
                averager.add(loss, 100.0 * correct as f64 / cfg.batch_size as f64);
            }
        }
    }

    if let EvalMode::Explain(_) = mode {
        return Ok(None);
    }

    if cfg.confusion {
        println!("{}", confusion.render(ctx.labels.names()));
    }
    if cfg.per_class {
        print_per_class(&confusion, ctx.labels);
    }

    let stats = averager.stats();
    Ok(Some(EvalSummary {
        loss:           stats.loss,
        accuracy:       stats.accuracy,
        macro_f1:       confusion.macro_f1(),
        weighted_f1:    confusion.weighted_f1(),
        top_k_accuracy: if seen == 0 { 0.0 } else { 100.0 * top_k_hits as f64 / seen as f64 },
    }))
}

fn print_per_class(confusion: &ConfusionMatrix, labels: &LabelSet) {
    let mut hits = 0usize;
    for (class, (correct, total)) in confusion.per_class().into_iter().enumerate() {
        hits += correct;
        let name = labels.name(class);
        if total == 0 {
            println!("Test Accuracy of {name:>12}: N/A (no examples)");
        } else {
            println!(
                "Test Accuracy of {name:>12}: {:3.0}% ({correct:2}/{total:2})",
                100.0 * correct as f64 / total as f64
            );
        }
    }
    println!(
        "Test Accuracy (Overall): {:3.0}% ({hits}/{})",
        100.0 * confusion.accuracy(),
        confusion.total()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        batcher::EmotionBatcher,
        dataset::{EmotionDataset, EmotionSample},
    };
    use burn::{backend::NdArray, data::dataloader::DataLoaderBuilder};
    use crate::ml::input::ModelInput;

    /// Predicts the class named by the second token of each row.
    #[derive(Module, Debug)]
    struct Oracle<B: Backend> {
        bias: burn::module::Param<Tensor<B, 1>>,
    }

    impl<B: Backend> EmotionClassifier<B> for Oracle<B> {
        fn logits(&self, input: ModelInput<B>, _mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
            let ids = match input {
                ModelInput::Single(ids) => ids,
                ModelInput::Tuple(mut parts) => parts.remove(0),
            };
            let [batch, _] = ids.dims();
            let classes = self.bias.val().dims()[0];
            let picked = ids.slice([0..batch, 1..2]).float();
            let grid = Tensor::<B, 1, Int>::arange(0..classes as i64, &picked.device())
                .float()
                .unsqueeze::<2>()
                .expand([batch, classes]);
            picked.expand([batch, classes]).equal(grid).float() * 5.0
                + self.bias.val().unsqueeze::<2>().expand([batch, classes])
        }
    }

    struct Collect(Vec<ExplainBatch>);

    impl Explainer for Collect {
        fn explain(&mut self, batch: &ExplainBatch) -> Result<()> {
            self.0.push(batch.clone());
            Ok(())
        }
    }

    fn sample(predicted: u32, label: usize) -> EmotionSample {
        EmotionSample {
            text: format!("pred {predicted} true {label}"),
            joint_ids: vec![2, predicted, 3],
            joint_mask: vec![1, 1, 1],
            parts: vec![vec![2, predicted, 3], vec![2, 3, 0]],
            label,
        }
    }

    fn stream(samples: Vec<EmotionSample>, batch_size: usize) -> Stream<NdArray> {
        DataLoaderBuilder::new(EmotionBatcher::<NdArray>::new(Default::default()))
            .batch_size(batch_size)
            .build(EmotionDataset::new(samples))
    }

    fn oracle() -> Oracle<NdArray> {
        Oracle { bias: burn::module::Param::from_tensor(Tensor::zeros([3], &Default::default())) }
    }

    #[test]
    fn metrics_over_the_four_pair_scenario() {
        let cfg = RunConfig { output_size: 3, batch_size: 4, top_k: 1, ..RunConfig::default() };
        let labels = LabelSet::new(["a", "b", "c"]);
        let device = Default::default();
        let ctx = EvalContext { config: &cfg, shape: InputShape::Single, labels: &labels, device: &device };
        // (true, predicted): (0,0) (1,1) (2,0) (0,0)
        let loader = stream(vec![sample(0, 0), sample(1, 1), sample(0, 2), sample(0, 0)], 4);

        let summary = evaluate(&oracle(), &loader, &ctx, EvalMode::Metrics).unwrap().unwrap();
        assert!((summary.macro_f1 - 1.8 / 3.0).abs() < 1e-9);
        assert!((summary.accuracy - 75.0).abs() < 1e-9);
        assert!((summary.top_k_accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn ragged_batches_are_left_out() {
        let cfg = RunConfig { output_size: 3, batch_size: 2, top_k: 1, ..RunConfig::default() };
        let labels = LabelSet::new(["a", "b", "c"]);
        let device = Default::default();
        let ctx = EvalContext { config: &cfg, shape: InputShape::Single, labels: &labels, device: &device };
        // two full correct batches, then a ragged wrong one
        let loader = stream(vec![sample(0, 0), sample(1, 1), sample(2, 2), sample(1, 1), sample(0, 2)], 2);

        let summary = evaluate(&oracle(), &loader, &ctx, EvalMode::Metrics).unwrap().unwrap();
        assert_eq!(summary.accuracy, 100.0);
        assert_eq!(summary.macro_f1, 1.0);
    }

    #[test]
    fn explain_mode_forwards_batches_and_returns_nothing() {
        let cfg = RunConfig { output_size: 3, batch_size: 2, ..RunConfig::default() };
        let labels = LabelSet::new(["a", "b", "c"]);
        let device = Default::default();
        let ctx = EvalContext { config: &cfg, shape: InputShape::Tuple(2), labels: &labels, device: &device };
        let loader = stream(vec![sample(2, 2), sample(1, 0)], 2);

        let mut sink = Collect(Vec::new());
        let out = evaluate(&oracle(), &loader, &ctx, EvalMode::Explain(&mut sink)).unwrap();
        assert!(out.is_none());
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].predictions, vec![2, 1]);
        assert_eq!(sink.0[0].labels, vec![2, 0]);
        let row_sum: f32 = sink.0[0].probabilities[0].iter().sum();
        assert!((row_sum - 1.0).abs() < 1e-5);
    }
}
