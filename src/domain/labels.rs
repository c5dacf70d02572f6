// ============================================================
// Layer 3 — Emotion Label Set
// ============================================================
// Bidirectional map between emotion names and class indices.
// Index order is the order the names were given in.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self { names: Vec::new(), index: HashMap::new() };
        for name in names {
            let name = name.into();
            if !out.index.contains_key(&name) {
                out.index.insert(name.clone(), out.names.len());
                out.names.push(name);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Name for `index`, or the index itself when out of range.
    pub fn name(&self, index: usize) -> String {
        self.names.get(index).cloned().unwrap_or_else(|| index.to_string())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_their_first_index() {
        let labels = LabelSet::new(["sad", "joyful", "sad", "afraid"]);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.index_of("afraid"), Some(2));
        assert_eq!(labels.name(1), "joyful");
        assert_eq!(labels.name(9), "9");
        assert_eq!(labels.index_of("proud"), None);
    }
}
