use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::data::embeddings::EmbeddingMatrix;
use crate::infra::tokenizer_store::PAD_ID;
use crate::ml::input::ModelInput;
use crate::ml::model::{padding_mask, token_embedding, EmotionClassifier};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct UtteranceEncoderConfig {
    pub vocab_size:       usize,
    pub embedding_length: usize,
    pub max_seq_len:      usize,
    pub d_model:          usize,
    pub num_heads:        usize,
    pub num_layers:       usize,
    pub d_ff:             usize,
    pub dropout:          f64,
}

impl UtteranceEncoderConfig {
    pub fn init<B: Backend>(&self, pretrained: Option<&EmbeddingMatrix>, device: &B::Device) -> UtteranceEncoder<B> {
        let token_embedding = token_embedding(self.vocab_size, self.embedding_length, pretrained, device);
        let input_proj = LinearConfig::new(self.embedding_length, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers = (0..self.num_layers).map(|_| self.build_encoder_block(device)).collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        UtteranceEncoder { token_embedding, input_proj, position_embedding, layers, final_norm, dropout }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1 = LayerNormConfig::new(self.d_model).init(device);
        let norm2 = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

/// Post-norm encoder layer: attention and GELU feed-forward, each
/// wrapped in a residual connection.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions, which attention ignores.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(burn::tensor::activation::gelu(
            self.ffn_linear1.forward(x.clone()),
        ));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// Encodes one token row into the final hidden state of its [CLS] position.
#[derive(Module, Debug)]
pub struct UtteranceEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub input_proj:         Linear<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> UtteranceEncoder<B> {
    /// ids, mask_pad: [batch, seq_len] → [batch, d_model]
    pub fn forward(&self, ids: Tensor<B, 2, Int>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = ids.dims();

        let tok_emb = self.input_proj.forward(self.token_embedding.forward(ids));
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        let x = self.final_norm.forward(x);

        let [_, _, d_model] = x.dims();
        x.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model])
    }
}

#[derive(Config, Debug)]
pub struct TransformerClassifierConfig {
    pub vocab_size:       usize,
    pub embedding_length: usize,
    pub max_seq_len:      usize,
    pub d_model:          usize,
    pub num_heads:        usize,
    pub num_layers:       usize,
    pub d_ff:             usize,
    pub dropout:          f64,
    pub output_size:      usize,
}

impl TransformerClassifierConfig {
    pub fn encoder(&self) -> UtteranceEncoderConfig {
        UtteranceEncoderConfig::new(
            self.vocab_size,
            self.embedding_length,
            self.max_seq_len,
            self.d_model,
            self.num_heads,
            self.num_layers,
            self.d_ff,
            self.dropout,
        )
    }

    pub fn init<B: Backend>(&self, pretrained: Option<&EmbeddingMatrix>, device: &B::Device) -> TransformerClassifier<B> {
        TransformerClassifier {
            encoder: self.encoder().init(pretrained, device),
            dropout: DropoutConfig::new(self.dropout).init(),
            head:    LinearConfig::new(self.d_model, self.output_size).init(device),
        }
    }
}

/// Encoder stack over the joint speaker/listener row.
#[derive(Module, Debug)]
pub struct TransformerClassifier<B: Backend> {
    pub encoder: UtteranceEncoder<B>,
    pub dropout: Dropout,
    pub head:    Linear<B>,
}

impl<B: Backend> EmotionClassifier<B> for TransformerClassifier<B> {
    fn logits(&self, input: ModelInput<B>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let ids = match input {
            ModelInput::Single(ids) => ids,
            ModelInput::Tuple(mut parts) => parts.remove(0),
        };
        let pooled = self.encoder.forward(ids, padding_mask(attention_mask, 0));
        self.head.forward(self.dropout.forward(pooled))
    }
}

/// Pad mask derived from the ids themselves, for rows without a stored mask.
pub(crate) fn ids_padding_mask<B: Backend>(ids: Tensor<B, 2, Int>) -> Tensor<B, 2, Bool> {
    padding_mask(ids, PAD_ID as i32)
}
