// ============================================================
// Layer 4 — Data Provider
// ============================================================
// Assembles everything a run needs from one dataset directory:
//
//   JsonlLoader      → utterances + label set
//   split_train_val  → validation carve-out when valid.jsonl is absent
//   TokenizerStore   → tokenizer (built from train if needed)
//   load_glove       → optional pretrained vectors
//   SampleEncoder    → fixed-length samples
//   DataLoaderBuilder→ batch streams on the run device
//
// The training stream lives on the autodiff backend and is
// reshuffled each epoch from the run seed. Evaluation streams live
// on the inner backend and keep file order.

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    tensor::backend::AutodiffBackend,
};
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::{EmotionBatch, EmotionBatcher},
    dataset::{EmotionDataset, SampleEncoder},
    embeddings::{load_glove, EmbeddingMatrix},
    loader::JsonlLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{config::RunConfig, error::TrainError, labels::LabelSet};
use crate::infra::tokenizer_store::TokenizerStore;

/// Upper bound on the word-level vocabulary built from train.
pub const VOCAB_LIMIT: usize = 30_000;

/// Share of train kept when validation is carved from it.
const CARVE_TRAIN_FRACTION: f64 = 0.9;

pub type Stream<B> = Arc<dyn DataLoader<EmotionBatch<B>>>;

pub struct DataBundle<B: AutodiffBackend> {
    pub vocab_size:        usize,
    pub embedding_weights: Option<EmbeddingMatrix>,
    pub labels:            LabelSet,
    pub train:             Stream<B>,
    pub valid:             Stream<B::InnerBackend>,
    pub test:              Stream<B::InnerBackend>,
}

pub trait DataProvider {
    fn load<B: AutodiffBackend>(&self, config: &RunConfig, device: &B::Device) -> Result<DataBundle<B>>;
}

/// Reads `<data_dir>/<dataset>/{train,valid,test}.jsonl`.
pub struct JsonlProvider;

impl JsonlProvider {
    pub fn dataset_dir(config: &RunConfig) -> PathBuf {
        PathBuf::from(&config.data_dir).join(&config.dataset)
    }
}

impl DataProvider for JsonlProvider {
    fn load<B: AutodiffBackend>(&self, config: &RunConfig, device: &B::Device) -> Result<DataBundle<B>> {
        let dir = Self::dataset_dir(config);
        let loader = JsonlLoader::new(&dir);

        let train_all = loader.load_split("train")?;
        let test = loader.load_split("test")?;
        let labels = loader.load_labels(&train_all)?;
        if labels.len() != config.output_size {
            return Err(TrainError::InvalidDataset(format!(
                "'{}' has {} labels but output_size is {}",
                dir.display(),
                labels.len(),
                config.output_size
            ))
            .into());
        }

        let (train, valid) = match loader.load_optional("valid")? {
            Some(valid) => (train_all, valid),
            None => {
                tracing::warn!("No valid.jsonl in '{}', carving validation from train", dir.display());
                split_train_val(train_all, CARVE_TRAIN_FRACTION, config.seed)
            }
        };

        let pre = Preprocessor::new();
        let corpus: Vec<String> = train
            .iter()
            .flat_map(|u| [pre.clean(&u.speaker), pre.clean(u.listener_text())])
            .filter(|t| !t.is_empty())
            .collect();
        let tokenizer = TokenizerStore::new(&dir).resolve(&config.tokenizer, &corpus, VOCAB_LIMIT)?;
        let vocab_size = tokenizer.get_vocab_size(true);

        let embedding_weights = match config.embedding_type.as_str() {
            "random" => None,
            "glove" => {
                let path = config.embedding_path.as_deref().ok_or_else(|| {
                    TrainError::InvalidConfig("embedding_type 'glove' needs embedding_path".into())
                })?;
                let matrix = load_glove(std::path::Path::new(path), &tokenizer, config.embedding_length, config.seed)
                    .context("Failed to load pretrained embeddings")?;
                Some(matrix)
            }
            other => {
                return Err(TrainError::InvalidConfig(format!("unknown embedding_type '{other}'")).into())
            }
        };

        let encoder = SampleEncoder::new(&tokenizer, &labels, config.input_type, config.max_seq_len);
        let train_ds = encoder.encode_all(&train)?;
        let valid_ds = encoder.encode_all(&valid)?;
        let test_ds = encoder.encode_all(&test)?;

        tracing::info!(
            "Dataset '{}': {} train / {} valid / {} test, {} labels, vocab {}",
            config.dataset,
            train_ds.samples().len(),
            valid_ds.samples().len(),
            test_ds.samples().len(),
            labels.len(),
            vocab_size,
        );

        let train_stream = DataLoaderBuilder::new(EmotionBatcher::<B>::new(device.clone()))
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(1)
            .build(train_ds);

        Ok(DataBundle {
            vocab_size,
            embedding_weights,
            labels,
            train: train_stream,
            valid: eval_stream::<B::InnerBackend>(valid_ds, config.batch_size, device),
            test: eval_stream::<B::InnerBackend>(test_ds, config.batch_size, device),
        })
    }
}

fn eval_stream<B: burn::tensor::backend::Backend>(
    dataset: EmotionDataset,
    batch_size: usize,
    device: &B::Device,
) -> Stream<B> {
    DataLoaderBuilder::new(EmotionBatcher::<B>::new(device.clone()))
        .batch_size(batch_size)
        .num_workers(1)
        .build(dataset)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{fs, path::Path};

    /// Writes a tiny three-emotion dataset under `<root>/<name>`.
    pub fn write_dataset(root: &Path, name: &str, with_valid: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let rows = [
            ("i won the prize", "congrats", "joyful"),
            ("my dog died", "so sorry", "sad"),
            ("someone took my seat", "how rude", "angry"),
            ("we are going to the beach", "have fun", "joyful"),
            ("i failed the exam", "next time", "sad"),
            ("the neighbours are loud again", "call them", "angry"),
        ];
        let line = |(s, l, e): &(&str, &str, &str)| {
            format!("{{\"speaker\":\"{s}\",\"listener\":\"{l}\",\"emotion\":\"{e}\"}}\n")
        };
        let body: String = rows.iter().cycle().take(24).map(line).collect();
        fs::write(dir.join("train.jsonl"), &body).unwrap();
        fs::write(dir.join("test.jsonl"), rows.iter().map(line).collect::<String>()).unwrap();
        if with_valid {
            fs::write(dir.join("valid.jsonl"), rows.iter().map(line).collect::<String>()).unwrap();
        }
        fs::write(dir.join("labels.txt"), "joyful\nsad\nangry\n").unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn config(root: &std::path::Path) -> RunConfig {
        RunConfig {
            data_dir: root.display().to_string(),
            dataset: "tiny".into(),
            output_size: 3,
            batch_size: 4,
            max_seq_len: 16,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_loads_streams_with_fixed_batch_size() {
        let tmp = tempfile::tempdir().unwrap();
        fixtures::write_dataset(tmp.path(), "tiny", true);
        let bundle = JsonlProvider.load::<TestBackend>(&config(tmp.path()), &Default::default()).unwrap();

        assert_eq!(bundle.labels.len(), 3);
        assert!(bundle.vocab_size > 5);
        assert!(bundle.embedding_weights.is_none());

        let sizes: Vec<usize> = bundle.test.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 2]);
        assert_eq!(bundle.train.iter().count(), 6);
    }

    #[test]
    fn test_carves_validation_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        fixtures::write_dataset(tmp.path(), "tiny", false);
        let bundle = JsonlProvider.load::<TestBackend>(&config(tmp.path()), &Default::default()).unwrap();

        // 24 train rows, 10% carved out rounds to 2
        let valid_rows: usize = bundle.valid.iter().map(|b| b.len()).sum();
        let train_rows: usize = bundle.train.iter().map(|b| b.len()).sum();
        assert_eq!((train_rows, valid_rows), (22, 2));
    }

    #[test]
    fn test_label_count_must_match_output_size() {
        let tmp = tempfile::tempdir().unwrap();
        fixtures::write_dataset(tmp.path(), "tiny", true);
        let cfg = RunConfig { output_size: 4, ..config(tmp.path()) };
        let err = JsonlProvider.load::<TestBackend>(&cfg, &Default::default()).err().unwrap();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::InvalidDataset(_))));
    }
}
