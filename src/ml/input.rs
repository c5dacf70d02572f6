// ============================================================
// Layer 5 — Model Input Adapter
// ============================================================
// Architectures declare what they read from a batch:
//
//   InputShape::Single     joint [CLS] speaker [SEP] listener [SEP] row
//   InputShape::Tuple(n)   the first n per-party rows
//
// `place_batch` is the single routine that moves a batch onto the
// run device and picks the declared input. `ensure_same_device`
// guards the forward call.

use burn::prelude::*;

use crate::data::batcher::EmotionBatch;
use crate::domain::error::TrainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    Single,
    Tuple(usize),
}

#[derive(Debug, Clone)]
pub enum ModelInput<B: Backend> {
    Single(Tensor<B, 2, Int>),
    Tuple(Vec<Tensor<B, 2, Int>>),
}

/// A batch adapted to one architecture and placed on one device.
#[derive(Debug)]
pub struct PlacedBatch<B: Backend> {
    pub input:          ModelInput<B>,
    pub attention_mask: Tensor<B, 2, Int>,
    pub labels:         Tensor<B, 1, Int>,
    pub texts:          Vec<String>,
}

/// Pick the tensors `shape` asks for, without moving anything.
pub fn select_input<B: Backend>(batch: EmotionBatch<B>, shape: InputShape) -> Result<PlacedBatch<B>, TrainError> {
    let input = match shape {
        InputShape::Single => ModelInput::Single(batch.input_ids),
        InputShape::Tuple(n) => {
            if batch.parts.len() < n {
                return Err(TrainError::InvalidDataset(format!(
                    "architecture reads {n} utterance parts, batch has {}",
                    batch.parts.len()
                )));
            }
            ModelInput::Tuple(batch.parts.into_iter().take(n).collect())
        }
    };
    Ok(PlacedBatch {
        input,
        attention_mask: batch.attention_mask,
        labels: batch.labels,
        texts: batch.texts,
    })
}

/// Move every tensor of `batch` onto `device` and select the input.
pub fn place_batch<B: Backend>(
    batch: EmotionBatch<B>,
    shape: InputShape,
    device: &B::Device,
) -> Result<PlacedBatch<B>, TrainError> {
    let placed = select_input(batch, shape)?;
    let input = match placed.input {
        ModelInput::Single(ids) => ModelInput::Single(ids.to_device(device)),
        ModelInput::Tuple(parts) => {
            ModelInput::Tuple(parts.into_iter().map(|p| p.to_device(device)).collect())
        }
    };
    Ok(PlacedBatch {
        input,
        attention_mask: placed.attention_mask.to_device(device),
        labels: placed.labels.to_device(device),
        texts: placed.texts,
    })
}

/// Fail with DeviceMismatch unless every input tensor sits on `model_device`.
pub fn ensure_same_device<B: Backend>(
    model_device: &B::Device,
    batch: &PlacedBatch<B>,
) -> Result<(), TrainError> {
    let mut devices = vec![batch.attention_mask.device(), batch.labels.device()];
    match &batch.input {
        ModelInput::Single(t) => devices.push(t.device()),
        ModelInput::Tuple(parts) => devices.extend(parts.iter().map(Tensor::device)),
    }
    match devices.into_iter().find(|d| d != model_device) {
        Some(other) => Err(TrainError::DeviceMismatch {
            model: format!("{model_device:?}"),
            batch: format!("{other:?}"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::EmotionBatcher, dataset::EmotionSample};
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher};

    fn batch() -> EmotionBatch<NdArray> {
        let sample = EmotionSample {
            text: "hi || hey".into(),
            joint_ids: vec![2, 7, 3, 8, 3],
            joint_mask: vec![1; 5],
            parts: vec![vec![2, 7, 3, 0, 0], vec![2, 8, 3, 0, 0]],
            label: 0,
        };
        EmotionBatcher::<NdArray>::new(Default::default()).batch(vec![sample.clone(), sample])
    }

    #[test]
    fn single_shape_reads_the_joint_row() {
        let placed = place_batch(batch(), InputShape::Single, &Default::default()).unwrap();
        match placed.input {
            ModelInput::Single(ids) => assert_eq!(ids.dims(), [2, 5]),
            ModelInput::Tuple(_) => panic!("expected a single input"),
        }
        assert!(ensure_same_device(&Default::default(), &place_batch(batch(), InputShape::Single, &Default::default()).unwrap()).is_ok());
    }

    #[test]
    fn tuple_shape_reads_the_parts() {
        let placed = select_input(batch(), InputShape::Tuple(2)).unwrap();
        match placed.input {
            ModelInput::Tuple(parts) => assert_eq!(parts.len(), 2),
            ModelInput::Single(_) => panic!("expected a tuple input"),
        }
    }

    #[test]
    fn tuple_wider_than_the_batch_is_rejected() {
        assert!(select_input(batch(), InputShape::Tuple(3)).is_err());
    }
}
