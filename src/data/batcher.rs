// ============================================================
// Layer 4 — Emotion Batcher
// ============================================================
// Implements Burn's Batcher trait to stack EmotionSamples into
// tensors on the batcher's device.
//
//   Input:  Vec of N samples, rows of length S
//   Output: EmotionBatch with [N, S] id/mask tensors, one [N, S]
//           tensor per party and [N] labels
//
// Rows are pre-padded by the encoder, so batching is a flatten and
// reshape. The last batch of an epoch may hold fewer than
// batch_size samples; the trainer and evaluator skip it.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::EmotionSample;

#[derive(Debug, Clone)]
pub struct EmotionBatch<B: Backend> {
    /// Joint token ids — [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Speaker ids then listener ids — each [batch_size, seq_len]
    pub parts: Vec<Tensor<B, 2, Int>>,

    /// Class indices — [batch_size]
    pub labels: Tensor<B, 1, Int>,

    /// Cleaned utterance text, one per row
    pub texts: Vec<String>,
}

impl<B: Backend> EmotionBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug)]
pub struct EmotionBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> EmotionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: impl Iterator<Item = Vec<u32>>, batch_size: usize, seq_len: usize) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = rows.flat_map(|r| r.into_iter().map(|x| x as i32)).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device).reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<EmotionSample, EmotionBatch<B>> for EmotionBatcher<B> {
    fn batch(&self, items: Vec<EmotionSample>) -> EmotionBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map_or(0, |s| s.joint_ids.len());
        let n_parts = items.first().map_or(0, |s| s.parts.len());

        let input_ids = self.stack(items.iter().map(|s| s.joint_ids.clone()), batch_size, seq_len);
        let attention_mask = self.stack(items.iter().map(|s| s.joint_mask.clone()), batch_size, seq_len);
        let parts = (0..n_parts)
            .map(|p| self.stack(items.iter().map(|s| s.parts[p].clone()), batch_size, seq_len))
            .collect();

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        let texts = items.into_iter().map(|s| s.text).collect();

        EmotionBatch { input_ids, attention_mask, parts, labels, texts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sample(label: usize, first: u32) -> EmotionSample {
        EmotionSample {
            text: format!("row {first}"),
            joint_ids: vec![2, first, 3, 0],
            joint_mask: vec![1, 1, 1, 0],
            parts: vec![vec![2, first, 3, 0], vec![2, 3, 0, 0]],
            label,
        }
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let batcher = EmotionBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(vec![sample(1, 7), sample(0, 9)]);

        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.parts.len(), 2);
        assert_eq!(batch.parts[1].dims(), [2, 4]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.texts, vec!["row 7".to_string(), "row 9".to_string()]);

        let ids: Vec<i64> = batch.input_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ids, vec![2, 7, 3, 0, 2, 9, 3, 0]);
        let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![1, 0]);
    }
}
