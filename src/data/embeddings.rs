// ============================================================
// Layer 4 — Pretrained Word Vectors
// ============================================================
// Loads a GloVe-style text file ("word v1 v2 ... vD" per line) and
// aligns it to the tokenizer vocabulary.
//
// Words the file does not cover get small seeded uniform vectors;
// the padding row stays zero. The resulting matrix is plain host
// data; the model layer turns it into a frozen embedding table.

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tokenizers::Tokenizer;

use crate::domain::error::TrainError;
use crate::infra::tokenizer_store::PAD_ID;

/// Row-major [rows, dim] matrix of word vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    pub rows:   usize,
    pub dim:    usize,
    pub values: Vec<f32>,
}

impl EmbeddingMatrix {
    #[cfg(test)]
    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }
}

pub fn load_glove(path: &Path, tokenizer: &Tokenizer, dim: usize, seed: u64) -> Result<EmbeddingMatrix> {
    let rows = tokenizer.get_vocab_size(true);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values: Vec<f32> = (0..rows * dim).map(|_| rng.gen_range(-0.25..0.25)).collect();
    let pad = PAD_ID as usize;
    values[pad * dim..(pad + 1) * dim].fill(0.0);

    let file = File::open(path).with_context(|| format!("Cannot open embeddings '{}'", path.display()))?;
    let mut covered = 0usize;

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else { continue };
        let Some(id) = tokenizer.token_to_id(word) else { continue };

        let vector: Vec<f32> = fields
            .map(str::parse::<f32>)
            .collect::<Result<_, _>>()
            .map_err(|e| TrainError::InvalidDataset(format!("{}:{}: {e}", path.display(), n + 1)))?;
        if vector.len() != dim {
            return Err(TrainError::InvalidDataset(format!(
                "{}:{}: vector has {} values, embedding_length is {dim}",
                path.display(),
                n + 1,
                vector.len()
            ))
            .into());
        }

        let id = id as usize;
        values[id * dim..(id + 1) * dim].copy_from_slice(&vector);
        covered += 1;
    }

    tracing::info!(
        "Pretrained vectors cover {}/{} vocabulary entries",
        covered,
        rows
    );
    Ok(EmbeddingMatrix { rows, dim, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    #[test]
    fn test_aligns_vectors_to_token_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(tmp.path())
            .resolve("word", &["happy sad".to_string()], 50)
            .unwrap();
        let glove = tmp.path().join("vectors.txt");
        std::fs::write(&glove, "happy 1 2 3\nunrelated 9 9 9\n").unwrap();

        let m = load_glove(&glove, &tok, 3, 0).unwrap();
        assert_eq!(m.rows, tok.get_vocab_size(true));
        assert_eq!(m.row(tok.token_to_id("happy").unwrap() as usize), &[1.0, 2.0, 3.0]);
        assert_eq!(m.row(PAD_ID as usize), &[0.0, 0.0, 0.0]);
        assert!(m.row(tok.token_to_id("sad").unwrap() as usize).iter().all(|v| v.abs() < 0.25));
    }

    #[test]
    fn test_wrong_dimension_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(tmp.path())
            .resolve("word", &["happy".to_string()], 50)
            .unwrap();
        let glove = tmp.path().join("vectors.txt");
        std::fs::write(&glove, "happy 1 2\n").unwrap();
        assert!(load_glove(&glove, &tok, 3, 0).is_err());
    }
}
