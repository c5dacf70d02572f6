// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads one dataset directory:
//
//   <data_dir>/<dataset>/
//     train.jsonl    required
//     valid.jsonl    optional (carved from train when missing)
//     test.jsonl     required
//     labels.txt     optional, one emotion name per line
//
// Each .jsonl line is one Utterance:
//   {"speaker": "...", "listener": "...", "emotion": "sad"}
//
// Blank lines are skipped. A line that does not parse fails the
// whole load with its line number; a silently shorter dataset
// would skew every metric computed from it.

use anyhow::{Context, Result};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{error::TrainError, labels::LabelSet, utterance::Utterance};

pub struct JsonlLoader {
    dir: PathBuf,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load `<split>.jsonl`, failing if it does not exist.
    pub fn load_split(&self, split: &str) -> Result<Vec<Utterance>> {
        self.load_optional(split)?.ok_or_else(|| {
            TrainError::InvalidDataset(format!(
                "missing '{}'",
                self.split_path(split).display()
            ))
            .into()
        })
    }

    /// Load `<split>.jsonl` if present.
    pub fn load_optional(&self, split: &str) -> Result<Option<Vec<Utterance>>> {
        let path = self.split_path(split);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let utterances = parse_jsonl(&text, &path)?;

        tracing::info!("Loaded {} utterances from '{}'", utterances.len(), path.display());
        Ok(Some(utterances))
    }

    /// Label names from `labels.txt`, else the sorted distinct
    /// emotions of `train`.
    pub fn load_labels(&self, train: &[Utterance]) -> Result<LabelSet> {
        let path = self.dir.join("labels.txt");
        if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Cannot read '{}'", path.display()))?;
            let names = text.lines().map(str::trim).filter(|l| !l.is_empty());
            return Ok(LabelSet::new(names));
        }

        tracing::debug!("No labels.txt in '{}', deriving labels from train", self.dir.display());
        let distinct: BTreeSet<&str> = train.iter().map(|u| u.emotion.as_str()).collect();
        Ok(LabelSet::new(distinct))
    }

    fn split_path(&self, split: &str) -> PathBuf {
        self.dir.join(format!("{split}.jsonl"))
    }
}

fn parse_jsonl(text: &str, path: &Path) -> Result<Vec<Utterance>, TrainError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Utterance>(line).map_err(|e| {
                TrainError::InvalidDataset(format!("{}:{}: {e}", path.display(), n + 1))
            })
        })
        .collect()
}
