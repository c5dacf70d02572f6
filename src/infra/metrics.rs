// ============================================================
// Layer 6 — Telemetry Logger
// ============================================================
// Per-epoch scalar series written to `metrics.csv` in the run
// directory. The file is appended to, so a resumed run extends the
// series of the run it continues.
//
// Example:
//   epoch,train_loss,valid_loss,train_acc,valid_acc,learning_rate
//   0,2.913400,2.850100,12.500000,14.200000,0.00003
//   1,2.401200,2.512300,25.000000,22.100000,0.00003
//
// Observability only; nothing reads this file back.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,valid_loss,train_acc,valid_acc,learning_rate";

/// One row of the telemetry series. `epoch` is zero-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochTelemetry {
    pub epoch:         usize,
    pub train_loss:    f64,
    pub valid_loss:    f64,
    pub train_acc:     f64,
    pub valid_acc:     f64,
    pub learning_rate: f64,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `<dir>/metrics.csv`, writing the header if the file is new.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochTelemetry) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{}",
            m.epoch, m.train_loss, m.valid_loss, m.train_acc, m.valid_acc, m.learning_rate,
        )?;

        tracing::debug!(
            "Logged epoch {} telemetry: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    /// Epoch numbers already present in the series.
    pub fn logged_epochs(&self) -> Result<Vec<usize>> {
        let text = fs::read_to_string(&self.csv_path)?;
        Ok(text
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next()?.parse().ok())
            .collect())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: usize) -> EpochTelemetry {
        EpochTelemetry {
            epoch,
            train_loss: 1.0,
            valid_loss: 1.1,
            train_acc: 50.0,
            valid_acc: 45.0,
            learning_rate: 3e-5,
        }
    }

    #[test]
    fn reopening_appends_without_a_second_header() {
        let tmp = tempfile::tempdir().unwrap();
        MetricsLogger::new(tmp.path()).unwrap().log(&row(0)).unwrap();

        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&row(1)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(text.matches("epoch,").count(), 1);
        assert_eq!(logger.logged_epochs().unwrap(), vec![0, 1]);
    }
}
