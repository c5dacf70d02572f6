// Speaker/listener classifier: one shared encoder reads each party's
// row separately; the two [CLS] states are concatenated and fused
// before the label projection.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::tanh,
};

use crate::data::embeddings::EmbeddingMatrix;
use crate::ml::input::ModelInput;
use crate::ml::model::transformer::{ids_padding_mask, UtteranceEncoder, UtteranceEncoderConfig};
use crate::ml::model::EmotionClassifier;

#[derive(Config, Debug)]
pub struct DualClassifierConfig {
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

impl DualClassifierConfig {
    pub fn init<B: Backend>(&self, pretrained: Option<&EmbeddingMatrix>, device: &B::Device) -> DualClassifier<B> {
        let encoder = UtteranceEncoderConfig::new(
            self.vocab_size,
            self.embedding_length,
            self.max_seq_len,
            self.d_model,
            self.num_heads,
            self.num_layers,
            self.d_ff,
            self.dropout,
        )
        .init(pretrained, device);

        DualClassifier {
            encoder,
            fuse:    LinearConfig::new(2 * self.d_model, self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            head:    LinearConfig::new(self.d_model, self.output_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct DualClassifier<B: Backend> {
    pub encoder: UtteranceEncoder<B>,
    pub fuse:    Linear<B>,
    pub dropout: Dropout,
    pub head:    Linear<B>,
}

impl<B: Backend> EmotionClassifier<B> for DualClassifier<B> {
    /// Reads the speaker and listener rows; the joint mask is unused.
    fn logits(&self, input: ModelInput<B>, _attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let parts = match input {
            ModelInput::Tuple(parts) => parts,
            // A joint row alone still classifies: both slots see it.
            ModelInput::Single(ids) => vec![ids.clone(), ids],
        };

        let pooled: Vec<Tensor<B, 2>> = parts
            .into_iter()
            .map(|ids| {
                let mask = ids_padding_mask(ids.clone());
                self.encoder.forward(ids, mask)
            })
            .collect();

        let fused = tanh(self.fuse.forward(Tensor::cat(pooled, 1)));
        self.head.forward(self.dropout.forward(fused))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn reads_both_parties() {
        let device = Default::default();
        let model = DualClassifierConfig::new(20, 8, 6, 16, 2, 1, 32, 0.0, 3).init::<NdArray>(None, &device);

        let speaker = Tensor::<NdArray, 2, Int>::from_ints([[2, 7, 3, 0, 0, 0], [2, 8, 9, 3, 0, 0]], &device);
        let listener = Tensor::<NdArray, 2, Int>::from_ints([[2, 5, 3, 0, 0, 0], [2, 3, 0, 0, 0, 0]], &device);
        let mask = Tensor::<NdArray, 2, Int>::ones([2, 6], &device);

        let logits = model.logits(ModelInput::Tuple(vec![speaker, listener]), mask);
        assert_eq!(logits.dims(), [2, 3]);
    }
}
