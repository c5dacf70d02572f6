// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Resolves the tokenizer a run uses:
//
//   tokenizer = "" | "word"  → <dataset dir>/tokenizer.json, built from
//                              the training utterances if missing
//   tokenizer = <path>       → a HuggingFace tokenizer.json on disk
//
// The word-level tokenizer JSON is written directly and loaded back
// with Tokenizer::from_file.
//
// Ids are contiguous: specials take 0..5, words follow by
// descending frequency, so vocab size == highest id + 1.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;
const SPECIALS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Pick the tokenizer named by the run configuration.
    pub fn resolve(&self, name: &str, texts: &[String], vocab_limit: usize) -> Result<Tokenizer> {
        match name {
            "" | "word" => self.load_or_build(texts, vocab_limit),
            path => load_file(Path::new(path)),
        }
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_limit: usize) -> Result<Tokenizer> {
        let tok_path = self.path();
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from '{}'", tok_path.display());
            load_file(&tok_path)
        } else {
            tracing::info!("Building word-level tokenizer (vocab limit {})", vocab_limit);
            self.build_and_save(texts, vocab_limit)
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    fn build_and_save(&self, texts: &[String], vocab_limit: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for piece in pre_tokenize(&text.to_lowercase()) {
                *freq.entry(piece).or_insert(0) += 1;
            }
        }

        // Frequency descending, then alphabetical so the ids are reproducible
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_limit.saturating_sub(SPECIALS.len()));

        let mut vocab = serde_json::Map::new();
        for (id, special) in SPECIALS.iter().enumerate() {
            vocab.insert(special.to_string(), serde_json::json!(id));
        }
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                let id = vocab.len();
                vocab.insert(word.clone(), serde_json::json!(id));
            }
        }
        let vocab_size = vocab.len();

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, content)| {
                serde_json::json!({
                    "id": id, "content": content, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": SPECIALS[UNK_ID as usize]
            }
        });

        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON '{}'", tok_path.display()))?;

        tracing::info!("Tokenizer built with {} ids, saved to '{}'", vocab_size, tok_path.display());
        load_file(&tok_path)
    }
}

fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))
}

/// Same split as the `Whitespace` pre-tokenizer: runs of word
/// characters, and runs of other non-space characters.
fn pre_tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_word = c.is_alphanumeric() || c == '_';
        if !current.is_empty() && is_word != current_is_word {
            out.push(std::mem::take(&mut current));
        }
        current_is_word = is_word;
        current.push(c);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_tokenize_splits_words_from_punctuation() {
        assert_eq!(pre_tokenize("i'm so happy!!"), vec!["i", "'", "m", "so", "happy", "!!"]);
    }

    #[test]
    fn built_tokenizer_has_contiguous_ids_and_maps_unknowns() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(tmp.path());
        let texts = vec!["I am happy".to_string(), "happy days".to_string()];

        let tok = store.resolve("word", &texts, 100).unwrap();
        assert_eq!(tok.get_vocab_size(true), SPECIALS.len() + 4);
        assert_eq!(tok.token_to_id("happy"), Some(SPECIALS.len() as u32));
        assert_eq!(tok.token_to_id("[PAD]"), Some(PAD_ID));
        assert_eq!(tok.token_to_id("[SEP]"), Some(SEP_ID));

        let enc = tok.encode("Happy zebra", false).unwrap();
        assert_eq!(enc.get_ids(), &[SPECIALS.len() as u32, UNK_ID]);

        // second call loads the file instead of rebuilding
        assert!(store.path().exists());
        let again = store.resolve("", &[], 100).unwrap();
        assert_eq!(again.get_vocab_size(true), tok.get_vocab_size(true));
    }

    #[test]
    fn vocab_limit_caps_the_word_list() {
        let tmp = tempfile::tempdir().unwrap();
        let texts = vec!["a b c d e f g".to_string()];
        let tok = TokenizerStore::new(tmp.path()).resolve("word", &texts, 7).unwrap();
        assert_eq!(tok.get_vocab_size(true), 7);
    }
}
