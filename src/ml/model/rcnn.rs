// Recurrent convolutional classifier (Lai et al., 2015).
//
//   embed [b, s, E] ─▶ BiLSTM [b, s, 2H] ─┐
//          └──────────────────────────────┴▶ concat [b, s, 2H+E]
//              ─▶ W2 [b, s, H] ─▶ max over s [b, H] ─▶ label [b, C]
//
// Padding positions take part in the max-pool; the attention mask
// is not used.

use burn::{
    nn::{BiLstm, BiLstmConfig, Embedding, Linear, LinearConfig},
    prelude::*,
};

use crate::data::embeddings::EmbeddingMatrix;
use crate::ml::input::ModelInput;
use crate::ml::model::{token_embedding, EmotionClassifier};

#[derive(Config, Debug)]
pub struct RcnnClassifierConfig {
    pub vocab_size:       usize,
    pub embedding_length: usize,
    pub hidden_size:      usize,
    pub output_size:      usize,
}

impl RcnnClassifierConfig {
    pub fn init<B: Backend>(&self, pretrained: Option<&EmbeddingMatrix>, device: &B::Device) -> RcnnClassifier<B> {
        RcnnClassifier {
            word_embeddings: token_embedding(self.vocab_size, self.embedding_length, pretrained, device),
            lstm:  BiLstmConfig::new(self.embedding_length, self.hidden_size, true).init(device),
            w2:    LinearConfig::new(2 * self.hidden_size + self.embedding_length, self.hidden_size).init(device),
            label: LinearConfig::new(self.hidden_size, self.output_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct RcnnClassifier<B: Backend> {
    pub word_embeddings: Embedding<B>,
    pub lstm:            BiLstm<B>,
    pub w2:              Linear<B>,
    pub label:           Linear<B>,
}

impl<B: Backend> RcnnClassifier<B> {
    /// ids: [batch, seq_len] → pooled features [batch, hidden]
    pub fn features(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.word_embeddings.forward(ids);
        let (context, _) = self.lstm.forward(embedded.clone(), None);
        let encoding = Tensor::cat(vec![context, embedded], 2);
        let y = self.w2.forward(encoding);
        let [batch_size, _, hidden] = y.dims();
        y.max_dim(1).reshape([batch_size, hidden])
    }
}

impl<B: Backend> EmotionClassifier<B> for RcnnClassifier<B> {
    fn logits(&self, input: ModelInput<B>, _attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let ids = match input {
            ModelInput::Single(ids) => ids,
            ModelInput::Tuple(mut parts) => parts.remove(0),
        };
        self.label.forward(self.features(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn logits_have_one_column_per_class() {
        let device = Default::default();
        let model = RcnnClassifierConfig::new(30, 6, 5, 4).init::<NdArray>(None, &device);
        let ids = Tensor::<NdArray, 2, Int>::from_ints([[2, 9, 12, 3, 0], [2, 4, 3, 0, 0], [2, 3, 0, 0, 0]], &device);
        let mask = Tensor::<NdArray, 2, Int>::ones([3, 5], &device);

        assert_eq!(model.features(ids.clone()).dims(), [3, 5]);
        assert_eq!(model.logits(ModelInput::Single(ids), mask).dims(), [3, 4]);
    }
}
