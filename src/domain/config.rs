// ============================================================
// Layer 3 — Run Configuration
// ============================================================
// Every hyperparameter of a run lives in one immutable record.
// It is built once (from CLI flags or from a prior run's log)
// and passed by reference into every component.
//
// The whole record is persisted as the `param` entry of log.json,
// which is what `eval`, `explain` and `retrain` rehydrate from.

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Which parts of a conversation turn feed the joint input sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "speaker")]
    Speaker,
    #[serde(rename = "listener")]
    Listener,
    #[serde(rename = "speaker+listener")]
    SpeakerListener,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Speaker => "speaker",
            InputType::Listener => "listener",
            InputType::SpeakerListener => "speaker+listener",
        }
    }

    pub fn uses_speaker(&self) -> bool {
        matches!(self, InputType::Speaker | InputType::SpeakerListener)
    }

    pub fn uses_listener(&self) -> bool {
        matches!(self, InputType::Listener | InputType::SpeakerListener)
    }
}

impl std::str::FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speaker" => Ok(InputType::Speaker),
            "listener" => Ok(InputType::Listener),
            "speaker+listener" => Ok(InputType::SpeakerListener),
            other => Err(format!(
                "unknown input type '{other}' (expected speaker, listener or speaker+listener)"
            )),
        }
    }
}

/// All hyperparameters of one training or evaluation run.
///
/// `#[serde(default)]` lets logs written before a field existed
/// still rehydrate; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub learning_rate:    f64,
    pub batch_size:       usize,
    pub hidden_size:      usize,
    pub output_size:      usize,
    pub arch_name:        String,
    pub input_type:       InputType,
    /// "" or "word" builds a word-level tokenizer; anything else is a tokenizer.json path
    pub tokenizer:        String,
    /// "random" or "glove"
    pub embedding_type:   String,
    pub embedding_length: usize,
    pub embedding_path:   Option<String>,
    pub max_seq_len:      usize,
    /// Decay the learning rate every `step_size` epochs; `None` keeps it constant
    pub step_size:        Option<usize>,
    pub lr_gamma:         f64,
    pub nepoch:           usize,
    pub patience:         usize,
    pub start_epoch:      usize,
    pub dataset:          String,
    pub data_dir:         String,
    pub save_dir:         String,
    /// Render a confusion matrix after each evaluation pass
    pub confusion:        bool,
    /// Print per-class accuracy after each evaluation pass
    pub per_class:        bool,
    pub top_k:            usize,
    pub grad_clip:        f64,
    pub num_heads:        usize,
    pub num_layers:       usize,
    pub d_ff:             usize,
    pub dropout:          f64,
    pub log_every:        usize,
    pub seed:             u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            learning_rate:    3e-5,
            batch_size:       12,
            hidden_size:      256,
            output_size:      32,
            arch_name:        "transformer".to_string(),
            input_type:       InputType::SpeakerListener,
            tokenizer:        String::new(),
            embedding_type:   "random".to_string(),
            embedding_length: 300,
            embedding_path:   None,
            max_seq_len:      128,
            step_size:        Some(10),
            lr_gamma:         0.5,
            nepoch:           5,
            patience:         30,
            start_epoch:      0,
            dataset:          "ed".to_string(),
            data_dir:         "data".to_string(),
            save_dir:         "save".to_string(),
            confusion:        false,
            per_class:        false,
            top_k:            3,
            grad_clip:        0.1,
            num_heads:        8,
            num_layers:       4,
            d_ff:             1024,
            dropout:          0.1,
            log_every:        100,
            seed:             0,
        }
    }
}

impl RunConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), TrainError> {
        let fail = |msg: String| Err(TrainError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".into());
        }
        if self.output_size < 2 {
            return fail(format!("output_size must be at least 2, got {}", self.output_size));
        }
        if self.top_k == 0 || self.top_k > self.output_size {
            return fail(format!(
                "top_k must be in 1..={}, got {}",
                self.output_size, self.top_k
            ));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.step_size == Some(0) {
            return fail("step_size must be at least 1 when set".into());
        }
        if self.max_seq_len < 4 {
            return fail(format!("max_seq_len must be at least 4, got {}", self.max_seq_len));
        }
        if self.hidden_size % self.num_heads.max(1) != 0 {
            return fail(format!(
                "hidden_size ({}) must be divisible by num_heads ({})",
                self.hidden_size, self.num_heads
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn input_type_uses_the_original_wire_names() {
        let json = serde_json::to_string(&InputType::SpeakerListener).unwrap();
        assert_eq!(json, "\"speaker+listener\"");
        assert_eq!("listener".parse::<InputType>().unwrap(), InputType::Listener);
        assert!("both".parse::<InputType>().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: RunConfig =
            serde_json::from_str(r#"{"arch_name": "rcnn", "batch_size": 4}"#).unwrap();
        assert_eq!(cfg.arch_name, "rcnn");
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.top_k, 3);
    }

    #[test]
    fn top_k_larger_than_class_count_is_rejected() {
        let cfg = RunConfig { output_size: 2, top_k: 3, ..RunConfig::default() };
        assert!(matches!(cfg.validate(), Err(TrainError::InvalidConfig(_))));
    }
}
