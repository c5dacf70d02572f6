// ============================================================
// Layer 5 — Burn Session
// ============================================================
// Binds one model, its optimizer and the data streams of a run into
// an EpochEngine the orchestrator can drive.
//
// The concrete model type is only known inside the registry's
// ModelVisitor, so callers pass a job closure to `open_session`; it
// receives the session as `&mut dyn Session` once the model is built
// (and restored, when resuming).

use anyhow::{anyhow, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::data::provider::{DataBundle, Stream};
use crate::domain::{
    config::RunConfig,
    labels::LabelSet,
    metrics::{EpochStats, EvalSummary},
    traits::{EpochEngine, Explainer, Split},
};
use crate::infra::checkpoint::save_record;
use crate::ml::evaluator::{evaluate, EvalContext, EvalMode};
use crate::ml::input::InputShape;
use crate::ml::model::{Architecture, EmotionClassifier, ModelSpec, ModelVisitor};
use crate::ml::resume::ResumePlan;
use crate::ml::trainer::{adam, train_one_epoch};

/// An EpochEngine that can also run explain passes.
pub trait Session: EpochEngine {
    fn explain(&mut self, split: Split, explainer: &mut dyn Explainer) -> Result<()>;
    fn labels(&self) -> &LabelSet;
}

pub struct BurnSession<B: AutodiffBackend, M, O> {
    model:  M,
    optim:  O,
    data:   DataBundle<B>,
    config: RunConfig,
    shape:  InputShape,
    device: B::Device,
}

impl<B, M, O> BurnSession<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + EmotionClassifier<B>,
    M::InnerModule: EmotionClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(model: M, optim: O, data: DataBundle<B>, config: RunConfig, shape: InputShape, device: B::Device) -> Self {
        Self { model, optim, data, config, shape, device }
    }

    fn stream(&self, split: Split) -> &Stream<B::InnerBackend> {
        match split {
            Split::Valid => &self.data.valid,
            Split::Test => &self.data.test,
        }
    }

    fn run_eval(&self, split: Split, mode: EvalMode<'_>) -> Result<Option<EvalSummary>> {
        // valid() drops the autodiff graph and disables dropout
        let model = self.model.valid();
        let ctx = EvalContext::<B::InnerBackend> {
            config: &self.config,
            shape:  self.shape,
            labels: &self.data.labels,
            device: &self.device,
        };
        evaluate(&model, self.stream(split), &ctx, mode)
    }
}

impl<B, M, O> EpochEngine for BurnSession<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + EmotionClassifier<B>,
    M::InnerModule: EmotionClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochStats> {
        train_one_epoch(
            &mut self.model,
            &mut self.optim,
            &self.data.train,
            &self.config,
            self.shape,
            &self.device,
            epoch,
            learning_rate,
        )
    }

    fn evaluate(&mut self, split: Split) -> Result<EvalSummary> {
        self.run_eval(split, EvalMode::Metrics)?
            .ok_or_else(|| anyhow!("metrics pass over {} returned no summary", split.as_str()))
    }

    fn save_weights(&self, model_stem: &Path, optim_stem: &Path) -> Result<()> {
        save_record::<B, _>(self.model.clone().into_record(), model_stem)?;
        save_record::<B, _>(self.optim.to_record(), optim_stem)
    }

    fn num_params(&self) -> usize {
        self.model.num_params()
    }
}

impl<B, M, O> Session for BurnSession<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + EmotionClassifier<B>,
    M::InnerModule: EmotionClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    fn explain(&mut self, split: Split, explainer: &mut dyn Explainer) -> Result<()> {
        self.run_eval(split, EvalMode::Explain(explainer)).map(|_| ())
    }

    fn labels(&self) -> &LabelSet {
        &self.data.labels
    }
}

type Job<'a, T> = Box<dyn FnOnce(&mut dyn Session) -> Result<T> + 'a>;

struct OpenSession<'a, B: AutodiffBackend, T> {
    config: &'a RunConfig,
    shape:  InputShape,
    data:   DataBundle<B>,
    device: B::Device,
    resume: Option<&'a ResumePlan>,
    job:    Job<'a, T>,
}

impl<'a, B: AutodiffBackend, T> ModelVisitor<B> for OpenSession<'a, B, T> {
    type Output = Result<T>;

    fn visit<M>(self, model: M) -> Result<T>
    where
        M: AutodiffModule<B> + EmotionClassifier<B> + 'static,
        M::InnerModule: EmotionClassifier<B::InnerBackend>,
    {
        let optim = adam(self.config).init::<B, M>();
        let (model, optim) = match self.resume {
            Some(plan) => plan.restore::<B, M, _>(model, optim, &self.device)?,
            None => (model, optim),
        };
        tracing::info!("Model ready: {} parameters", model.num_params());

        let mut session = BurnSession::new(model, optim, self.data, self.config.clone(), self.shape, self.device);
        (self.job)(&mut session)
    }
}

/// Build the configured architecture over `data`, optionally restore it
/// from `resume`, and run `job` against the resulting session.
pub fn open_session<'a, B, T>(
    config: &'a RunConfig,
    mut data: DataBundle<B>,
    device: &B::Device,
    resume: Option<&'a ResumePlan>,
    job:    impl FnOnce(&mut dyn Session) -> Result<T> + 'a,
) -> Result<T>
where
    B: AutodiffBackend,
{
    let arch = Architecture::lookup(&config.arch_name)?;
    arch.check(config)?;
    B::seed(config.seed);

    let embeddings = data.embedding_weights.take();
    let spec = ModelSpec {
        config,
        vocab_size: data.vocab_size,
        embeddings: embeddings.as_ref(),
    };
    let visitor = OpenSession {
        config,
        shape: arch.input_shape(),
        data,
        device: device.clone(),
        resume,
        job: Box::new(job),
    };
    arch.build::<B, _>(&spec, device, visitor)
}
