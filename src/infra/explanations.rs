// ============================================================
// Layer 6 — Explanation Writer
// ============================================================
// Explainer that appends one JSON object per example to
// `<run_dir>/explanations.jsonl`:
//
//   {"text": "...", "label": "sad", "predicted": "lonely",
//    "correct": false, "top": [["lonely", 0.61], ["sad", 0.22], ...]}
//
// `top` holds the k most probable classes, most probable first.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::{
    labels::LabelSet,
    traits::{ExplainBatch, Explainer},
};

pub const EXPLANATIONS_FILE: &str = "explanations.jsonl";

#[derive(Debug, Serialize)]
struct ExplanationLine<'a> {
    text:      &'a str,
    label:     String,
    predicted: String,
    correct:   bool,
    top:       Vec<(String, f32)>,
}

pub struct JsonlExplainer {
    path:    PathBuf,
    out:     BufWriter<File>,
    labels:  LabelSet,
    top_k:   usize,
    written: usize,
}

impl JsonlExplainer {
    /// Truncates any explanations left by an earlier pass.
    pub fn create(dir: &Path, labels: LabelSet, top_k: usize) -> Result<Self> {
        let path = dir.join(EXPLANATIONS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        Ok(Self { path, out: BufWriter::new(file), labels, top_k, written: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered lines to disk.
    pub fn finish(mut self) -> Result<usize> {
        self.out
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.path.display()))?;
        tracing::info!("Wrote {} explanations to '{}'", self.written, self.path.display());
        Ok(self.written)
    }
}

impl Explainer for JsonlExplainer {
    fn explain(&mut self, batch: &ExplainBatch) -> Result<()> {
        for (((text, &label), &predicted), probs) in batch
            .texts
            .iter()
            .zip(&batch.labels)
            .zip(&batch.predictions)
            .zip(&batch.probabilities)
        {
            let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

            let line = ExplanationLine {
                text,
                label:     self.labels.name(label),
                predicted: self.labels.name(predicted),
                correct:   label == predicted,
                top:       ranked
                    .into_iter()
                    .take(self.top_k)
                    .map(|(class, p)| (self.labels.name(class), p))
                    .collect(),
            };
            serde_json::to_writer(&mut self.out, &line)?;
            self.out.write_all(b"\n")?;
            self.written += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_example_with_ranked_top_k() {
        let tmp = tempfile::tempdir().unwrap();
        let mut explainer = JsonlExplainer::create(tmp.path(), LabelSet::new(["joy", "sad", "anger"]), 2).unwrap();

        explainer
            .explain(&ExplainBatch {
                texts:         vec!["i won".into(), "it broke".into()],
                labels:        vec![0, 2],
                predictions:   vec![0, 1],
                probabilities: vec![vec![0.7, 0.2, 0.1], vec![0.1, 0.5, 0.4]],
            })
            .unwrap();
        let path = explainer.path().to_path_buf();
        assert_eq!(explainer.finish().unwrap(), 2);

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["label"], "anger");
        assert_eq!(lines[1]["predicted"], "sad");
        assert_eq!(lines[1]["correct"], false);
        assert_eq!(lines[1]["top"][0][0], "sad");
        assert_eq!(lines[1]["top"][1][0], "anger");
        assert_eq!(lines[1]["top"].as_array().unwrap().len(), 2);
    }
}
