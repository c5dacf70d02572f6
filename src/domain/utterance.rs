// ============================================================
// Layer 3 — Utterance Domain Type
// ============================================================
// One labelled conversation turn as it appears on disk, before
// cleaning or tokenisation.

use serde::{Deserialize, Serialize};

use crate::domain::config::InputType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,

    /// Reply from the other party, when the dataset records one
    #[serde(default)]
    pub listener: Option<String>,

    /// Emotion name, resolved to a class index through the LabelSet
    pub emotion: String,
}

impl Utterance {
    #[cfg(test)]
    pub fn new(speaker: impl Into<String>, listener: Option<&str>, emotion: impl Into<String>) -> Self {
        Self {
            speaker:  speaker.into(),
            listener: listener.map(str::to_string),
            emotion:  emotion.into(),
        }
    }

    pub fn listener_text(&self) -> &str {
        self.listener.as_deref().unwrap_or("")
    }

    /// Human-readable text for the parties selected by `input_type`.
    pub fn display_text(&self, input_type: InputType) -> String {
        match input_type {
            InputType::Speaker => self.speaker.clone(),
            InputType::Listener => self.listener_text().to_string(),
            InputType::SpeakerListener => {
                format!("{} || {}", self.speaker, self.listener_text())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_is_optional_on_the_wire() {
        let u: Utterance =
            serde_json::from_str(r#"{"speaker": "I lost my keys", "emotion": "annoyed"}"#).unwrap();
        assert_eq!(u.listener, None);
        assert_eq!(u.display_text(InputType::SpeakerListener), "I lost my keys || ");
    }
}
