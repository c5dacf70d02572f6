// ============================================================
// Layer 3 — Run Log
// ============================================================
// The durable record paired with the best checkpoint. The JSON
// layout is flat so existing tooling can read it:
//
//   { "param": {...}, "train_acc": .., "valid_acc": .., "test_acc": ..,
//     "train_loss": .., "valid_loss": .., "test_loss": ..,
//     "test_f1_score": .., "valid_f1_score": ..,
//     "weighted_test_f1_score": .., "weighted_valid_f1_score": ..,
//     "top3_acc": .., "epoch": .., "note": "" }
//
// Accuracies are percentages. `epoch` counts completed epochs, so it
// equals the zero-based index of the best epoch plus one.

use serde::{Deserialize, Serialize};

use crate::domain::config::RunConfig;
use crate::domain::metrics::{EpochStats, EvalSummary};

/// Metrics of the best epoch, flattened into the log object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestEpoch {
    pub epoch:                   usize,
    pub train_acc:               f64,
    pub valid_acc:               f64,
    pub test_acc:                f64,
    pub train_loss:              f64,
    pub valid_loss:              f64,
    pub test_loss:               f64,
    pub test_f1_score:           f64,
    pub valid_f1_score:          f64,
    pub weighted_test_f1_score:  f64,
    pub weighted_valid_f1_score: f64,
    /// Top-k accuracy on the test split (k = `param.top_k`)
    pub top3_acc:                f64,
    pub note:                    String,
}

impl BestEpoch {
    /// Bundle one epoch's train / valid / test results. `epoch` is zero-based.
    pub fn from_epoch(
        epoch: usize,
        train: &EpochStats,
        valid: &EvalSummary,
        test:  &EvalSummary,
        note:  &str,
    ) -> Self {
        Self {
            epoch:                   epoch + 1,
            train_acc:               train.accuracy,
            valid_acc:               valid.accuracy,
            test_acc:                test.accuracy,
            train_loss:              train.loss,
            valid_loss:              valid.loss,
            test_loss:               test.loss,
            test_f1_score:           test.macro_f1,
            valid_f1_score:          valid.macro_f1,
            weighted_test_f1_score:  test.weighted_f1,
            weighted_valid_f1_score: valid.weighted_f1,
            top3_acc:                test.top_k_accuracy,
            note:                    note.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub param: RunConfig,

    #[serde(flatten)]
    pub best: BestEpoch,

    /// Test macro-F1 recorded by a later `eval` pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
}

impl RunLog {
    pub fn new(param: RunConfig, best: BestEpoch) -> Self {
        Self { param, best, f1_score: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunLog {
        let train = EpochStats { loss: 1.2, accuracy: 55.0, batches: 10 };
        let valid = EvalSummary { loss: 1.4, accuracy: 60.0, macro_f1: 0.5, weighted_f1: 0.6, top_k_accuracy: 80.0 };
        let test  = EvalSummary { loss: 1.5, accuracy: 58.0, macro_f1: 0.4, weighted_f1: 0.55, top_k_accuracy: 78.0 };
        RunLog::new(RunConfig::default(), BestEpoch::from_epoch(2, &train, &valid, &test, "baseline"))
    }

    #[test]
    fn log_is_a_flat_object_with_the_expected_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "param", "train_acc", "valid_acc", "test_acc", "train_loss", "valid_loss",
            "test_loss", "test_f1_score", "valid_f1_score", "weighted_test_f1_score",
            "weighted_valid_f1_score", "top3_acc", "epoch", "note",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert!(!obj.contains_key("f1_score"));
        assert_eq!(obj["epoch"], 3);
        assert_eq!(obj["param"]["arch_name"], "transformer");
    }

    #[test]
    fn log_survives_a_json_round_trip() {
        let log = sample();
        let text = serde_json::to_string_pretty(&log).unwrap();
        let back: RunLog = serde_json::from_str(&text).unwrap();
        assert_eq!(back, log);
    }
}
