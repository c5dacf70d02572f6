// ============================================================
// Layer 4 — Utterance Preprocessor
// ============================================================
// Normalises one utterance before tokenisation.
//
// The dialogue corpora escape commas inside utterances as the
// literal token `_comma_`, and scraped turns carry stray tabs,
// non-breaking spaces and line breaks. An utterance is a single
// line of text, so every kind of whitespace collapses to one space.
//
// Cleaning steps (applied in order):
//   1. `_comma_` → `,`
//   2. Unicode whitespace variants and control characters → space
//   3. Runs of spaces → one space, then trim

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw utterance for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {
        let unescaped = text.replace("_comma_", ",");

        let mut out = String::with_capacity(unescaped.len());
        let mut last_space = true;

        for c in unescaped.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescapes_commas() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("well_comma_ I guess"), "well, I guess");
    }

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_flattens_line_breaks_and_trims() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  so\r\nhappy\t!  "), "so happy !");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }
}
