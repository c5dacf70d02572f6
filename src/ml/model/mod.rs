// ============================================================
// Layer 5 — Model Registry
// ============================================================
// Architectures are named in the run configuration and looked up
// here. Each entry declares the input shape it reads; construction
// dispatches once through a ModelVisitor so the rest of the run is
// monomorphised over the concrete model type.
//
//   name             input        model
//   rcnn             Single       RcnnClassifier
//   transformer      Single       TransformerClassifier
//   sl_transformer   Tuple(2)     DualClassifier

use burn::{
    module::{AutodiffModule, Param},
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::{backend::AutodiffBackend, TensorData},
};

use crate::data::embeddings::EmbeddingMatrix;
use crate::domain::{
    config::{InputType, RunConfig},
    error::TrainError,
};
use crate::ml::input::{InputShape, ModelInput};

pub mod dual;
pub mod rcnn;
pub mod transformer;

use dual::DualClassifierConfig;
use rcnn::RcnnClassifierConfig;
use transformer::TransformerClassifierConfig;

/// Anything that maps a batch to class logits `[batch, output_size]`.
pub trait EmotionClassifier<B: Backend> {
    fn logits(&self, input: ModelInput<B>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2>;
}

/// Receives the concrete model built for an architecture.
pub trait ModelVisitor<B: AutodiffBackend> {
    type Output;

    fn visit<M>(self, model: M) -> Self::Output
    where
        M: AutodiffModule<B> + EmotionClassifier<B> + 'static,
        M::InnerModule: EmotionClassifier<B::InnerBackend>;
}

/// Sizes that come from the data rather than the configuration.
pub struct ModelSpec<'a> {
    pub config:     &'a RunConfig,
    pub vocab_size: usize,
    pub embeddings: Option<&'a EmbeddingMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Rcnn,
    Transformer,
    SlTransformer,
}

impl Architecture {
    pub const REGISTRY: [(&'static str, Architecture); 3] = [
        ("rcnn", Architecture::Rcnn),
        ("transformer", Architecture::Transformer),
        ("sl_transformer", Architecture::SlTransformer),
    ];

    pub fn lookup(name: &str) -> Result<Self, TrainError> {
        Self::REGISTRY
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, arch)| *arch)
            .ok_or_else(|| TrainError::ConfigMismatch {
                name:  name.to_string(),
                known: Self::REGISTRY.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Rcnn => "rcnn",
            Architecture::Transformer => "transformer",
            Architecture::SlTransformer => "sl_transformer",
        }
    }

    pub fn input_shape(&self) -> InputShape {
        match self {
            Architecture::Rcnn | Architecture::Transformer => InputShape::Single,
            Architecture::SlTransformer => InputShape::Tuple(2),
        }
    }

    /// Configuration constraints specific to this architecture.
    pub fn check(&self, config: &RunConfig) -> Result<(), TrainError> {
        if *self == Architecture::SlTransformer && config.input_type != InputType::SpeakerListener {
            return Err(TrainError::InvalidConfig(format!(
                "{} reads both parties, input_type is '{}'",
                self.name(),
                config.input_type.as_str()
            )));
        }
        Ok(())
    }

    /// Build the model on `device` and hand it to `visitor`.
    pub fn build<B, V>(&self, spec: &ModelSpec, device: &B::Device, visitor: V) -> V::Output
    where
        B: AutodiffBackend,
        V: ModelVisitor<B>,
    {
        let cfg = spec.config;
        match self {
            Architecture::Rcnn => visitor.visit(
                RcnnClassifierConfig::new(spec.vocab_size, cfg.embedding_length, cfg.hidden_size, cfg.output_size)
                    .init::<B>(spec.embeddings, device),
            ),
            Architecture::Transformer => visitor.visit(
                TransformerClassifierConfig::new(
                    spec.vocab_size,
                    cfg.embedding_length,
                    cfg.max_seq_len,
                    cfg.hidden_size,
                    cfg.num_heads,
                    cfg.num_layers,
                    cfg.d_ff,
                    cfg.dropout,
                    cfg.output_size,
                )
                .init::<B>(spec.embeddings, device),
            ),
            Architecture::SlTransformer => visitor.visit(
                DualClassifierConfig::new(
                    spec.vocab_size,
                    cfg.embedding_length,
                    cfg.max_seq_len,
                    cfg.hidden_size,
                    cfg.num_heads,
                    cfg.num_layers,
                    cfg.d_ff,
                    cfg.dropout,
                    cfg.output_size,
                )
                .init::<B>(spec.embeddings, device),
            ),
        }
    }
}

/// Token embedding table, loaded from `pretrained` and frozen when given.
pub(crate) fn token_embedding<B: Backend>(
    vocab_size: usize,
    dim: usize,
    pretrained: Option<&EmbeddingMatrix>,
    device: &B::Device,
) -> Embedding<B> {
    match pretrained {
        Some(m) if m.rows == vocab_size && m.dim == dim => {
            let weight = Tensor::<B, 2>::from_data(TensorData::new(m.values.clone(), [m.rows, m.dim]), device);
            Embedding { weight: Param::from_tensor(weight).set_require_grad(false) }
        }
        Some(m) => {
            tracing::warn!(
                "Pretrained matrix is {}x{}, model wants {}x{}; using random embeddings",
                m.rows,
                m.dim,
                vocab_size,
                dim
            );
            EmbeddingConfig::new(vocab_size, dim).init(device)
        }
        None => EmbeddingConfig::new(vocab_size, dim).init(device),
    }
}

/// `true` at padding positions, the form attention masks expect.
pub(crate) fn padding_mask<B: Backend>(ids_or_mask: Tensor<B, 2, Int>, pad_value: i32) -> Tensor<B, 2, Bool> {
    ids_or_mask.equal_elem(pad_value)
}
