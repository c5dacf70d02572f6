// ============================================================
// Layer 4 — Emotion Dataset
// ============================================================
// Turns cleaned utterances into fixed-length token id rows and
// wraps them in Burn's Dataset trait.
//
// Every sample carries two views of the same turn:
//
//   joint  [CLS] speaker [SEP] listener [SEP] [PAD]...
//          (only the parties selected by input_type)
//   parts  [CLS] speaker [SEP] [PAD]...
//          [CLS] listener [SEP] [PAD]...
//
// Single-input architectures read the joint row, tuple-input
// architectures read the parts. All rows are max_seq_len long.

use anyhow::Result;
use burn::data::dataset::Dataset;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::preprocessor::Preprocessor;
use crate::domain::{config::InputType, error::TrainError, labels::LabelSet, utterance::Utterance};
use crate::infra::tokenizer_store::{CLS_ID, PAD_ID, SEP_ID};

#[derive(Debug, Clone)]
pub struct EmotionSample {
    /// Cleaned text as shown to an explainer
    pub text:       String,
    pub joint_ids:  Vec<u32>,
    /// 1 = real token, 0 = padding
    pub joint_mask: Vec<u32>,
    /// Speaker row, then listener row
    pub parts:      Vec<Vec<u32>>,
    pub label:      usize,
}

/// Cheap to clone: the training and evaluation loaders of one split
/// share the same samples.
#[derive(Debug, Clone)]
pub struct EmotionDataset {
    samples: Arc<Vec<EmotionSample>>,
}

impl EmotionDataset {
    pub fn new(samples: Vec<EmotionSample>) -> Self {
        Self { samples: Arc::new(samples) }
    }

    pub fn samples(&self) -> &[EmotionSample] {
        &self.samples
    }
}

impl Dataset<EmotionSample> for EmotionDataset {
    fn get(&self, index: usize) -> Option<EmotionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

pub struct SampleEncoder<'a> {
    tokenizer:    &'a Tokenizer,
    labels:       &'a LabelSet,
    input_type:   InputType,
    max_seq_len:  usize,
    preprocessor: Preprocessor,
}

impl<'a> SampleEncoder<'a> {
    pub fn new(
        tokenizer: &'a Tokenizer,
        labels: &'a LabelSet,
        input_type: InputType,
        max_seq_len: usize,
    ) -> Self {
        Self { tokenizer, labels, input_type, max_seq_len, preprocessor: Preprocessor::new() }
    }

    pub fn encode_all(&self, utterances: &[Utterance]) -> Result<EmotionDataset> {
        let samples = utterances
            .iter()
            .map(|u| self.encode(u))
            .collect::<Result<Vec<_>>>()?;
        Ok(EmotionDataset::new(samples))
    }

    pub fn encode(&self, utterance: &Utterance) -> Result<EmotionSample> {
        let label = self.labels.index_of(&utterance.emotion).ok_or_else(|| {
            TrainError::InvalidDataset(format!("emotion '{}' is not in the label set", utterance.emotion))
        })?;

        let cleaned = Utterance {
            speaker:  self.preprocessor.clean(&utterance.speaker),
            listener: utterance.listener.as_deref().map(|l| self.preprocessor.clean(l)),
            emotion:  utterance.emotion.clone(),
        };
        let speaker = self.token_ids(&cleaned.speaker)?;
        let listener = self.token_ids(cleaned.listener_text())?;

        let mut joint = vec![CLS_ID];
        if self.input_type.uses_speaker() {
            joint.extend(&speaker);
            joint.push(SEP_ID);
        }
        if self.input_type.uses_listener() {
            joint.extend(&listener);
            joint.push(SEP_ID);
        }
        let (joint_ids, joint_mask) = pad(joint, self.max_seq_len);

        let parts = [speaker, listener]
            .into_iter()
            .map(|ids| {
                let mut row = Vec::with_capacity(ids.len() + 2);
                row.push(CLS_ID);
                row.extend(ids);
                row.push(SEP_ID);
                pad(row, self.max_seq_len).0
            })
            .collect();

        Ok(EmotionSample {
            text: cleaned.display_text(self.input_type),
            joint_ids,
            joint_mask,
            parts,
            label,
        })
    }

    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation failed: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }
}

/// Truncate or pad `ids` to `len`, keeping a trailing [SEP] on
/// truncated rows.
fn pad(mut ids: Vec<u32>, len: usize) -> (Vec<u32>, Vec<u32>) {
    if ids.len() > len {
        ids.truncate(len);
        if let Some(last) = ids.last_mut() {
            *last = SEP_ID;
        }
    }
    let real = ids.len();
    ids.resize(len, PAD_ID);

    let mut mask = vec![1u32; real];
    mask.resize(len, 0);
    (ids, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn fixture(dir: &std::path::Path) -> (Tokenizer, LabelSet) {
        let texts = vec!["i lost my keys".to_string(), "oh no".to_string()];
        let tok = TokenizerStore::new(dir).resolve("word", &texts, 100).unwrap();
        (tok, LabelSet::new(["sad", "annoyed"]))
    }

    #[test]
    fn test_pad_truncates_and_keeps_sep() {
        let (ids, mask) = pad(vec![CLS_ID, 7, 8, 9, SEP_ID], 4);
        assert_eq!(ids, vec![CLS_ID, 7, 8, SEP_ID]);
        assert_eq!(mask, vec![1, 1, 1, 1]);

        let (ids, mask) = pad(vec![CLS_ID, 7, SEP_ID], 5);
        assert_eq!(ids, vec![CLS_ID, 7, SEP_ID, PAD_ID, PAD_ID]);
        assert_eq!(mask, vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_joint_row_follows_input_type() {
        let tmp = tempfile::tempdir().unwrap();
        let (tok, labels) = fixture(tmp.path());
        let u = Utterance::new("I lost_comma_ my keys", Some("oh no"), "annoyed");

        let both = SampleEncoder::new(&tok, &labels, InputType::SpeakerListener, 16).encode(&u).unwrap();
        assert_eq!(both.label, 1);
        assert_eq!(both.text, "I lost, my keys || oh no");
        // CLS + 5 speaker pieces (comma included) + SEP + 2 + SEP
        assert_eq!(both.joint_mask.iter().sum::<u32>(), 10);
        assert_eq!(both.parts.len(), 2);
        assert_eq!(both.parts[1][..4], [CLS_ID, tok.token_to_id("oh").unwrap(), tok.token_to_id("no").unwrap(), SEP_ID]);

        let speaker = SampleEncoder::new(&tok, &labels, InputType::Speaker, 16).encode(&u).unwrap();
        assert_eq!(speaker.joint_mask.iter().sum::<u32>(), 7);
        assert_eq!(speaker.joint_ids.len(), 16);
    }

    #[test]
    fn test_unknown_emotion_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (tok, labels) = fixture(tmp.path());
        let u = Utterance::new("hi", None, "proud");
        let err = SampleEncoder::new(&tok, &labels, InputType::Speaker, 8).encode(&u).unwrap_err();
        assert!(err.to_string().contains("proud"));
    }
}
