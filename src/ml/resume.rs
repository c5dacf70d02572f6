// ============================================================
// Layer 5 — Resume Controller
// ============================================================
// Rebuilds a run from its directory:
//
//   1. locate   checkpoint path → run dir + slot, read meta and log.json
//   2. verify   architecture known, meta and log agree
//   3. restore  load model and optimizer records into fresh objects
//
// The stored epoch counts completed epochs, so it is also the
// zero-based index of the next epoch to run.

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, optim::Optimizer, tensor::backend::AutodiffBackend};
use std::path::Path;

use crate::domain::{config::RunConfig, error::TrainError, run_log::RunLog};
use crate::infra::checkpoint::{load_record, CheckpointManager, CheckpointMeta, SlotPaths};
use crate::ml::model::Architecture;

#[derive(Debug, Clone)]
pub struct ResumePlan {
    pub manager:     CheckpointManager,
    pub slot:        SlotPaths,
    pub meta:        CheckpointMeta,
    pub log:         RunLog,
    pub arch:        Architecture,
    pub start_epoch: usize,
}

impl ResumePlan {
    pub fn locate(checkpoint: &Path) -> Result<Self> {
        let (manager, slot) = CheckpointManager::locate(checkpoint)?;
        let log = manager.read_log()?;
        let meta = manager.read_meta(&slot)?;

        let arch = Architecture::lookup(&log.param.arch_name)?;

        let start_epoch = meta
            .epoch
            .ok_or_else(|| TrainError::corrupt(slot.meta.display(), "checkpoint has no epoch"))?;

        if meta.arch != log.param.arch_name {
            return Err(TrainError::corrupt(
                slot.meta.display(),
                format!("checkpoint arch '{}' but log arch '{}'", meta.arch, log.param.arch_name),
            )
            .into());
        }
        if slot.is_best() && start_epoch != log.best.epoch {
            return Err(TrainError::corrupt(
                slot.meta.display(),
                format!("best checkpoint is epoch {start_epoch} but log records epoch {}", log.best.epoch),
            )
            .into());
        }

        tracing::info!(
            "Resuming '{}' from {} slot after epoch {} (best valid_acc {:.2}%)",
            manager.dir().display(),
            slot.name,
            start_epoch,
            log.best.valid_acc
        );
        Ok(Self { manager, slot, meta, log, arch, start_epoch })
    }

    /// Configuration the run was trained with, continuing at `start_epoch`.
    pub fn config(&self) -> RunConfig {
        RunConfig { start_epoch: self.start_epoch, ..self.log.param.clone() }
    }

    /// Best validation accuracy and its zero-based epoch, from the log.
    pub fn prior_best(&self) -> (f64, Option<usize>) {
        (self.log.best.valid_acc, self.log.best.epoch.checked_sub(1))
    }

    /// Load stored weights into freshly constructed model and optimizer.
    ///
    /// `model` must already have the shape described by log.json.
    /// Loading a record replaces parameter tensors wholesale, so the
    /// size check runs on the fresh model before anything is loaded,
    /// and again on the result.
    pub fn restore<B, M, O>(&self, model: M, optim: O, device: &B::Device) -> Result<(M, O)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let expected = model.num_params();
        if expected != self.meta.num_params {
            return Err(TrainError::corrupt(
                self.slot.model_file().display(),
                format!(
                    "model built from log.json has {expected} parameters, checkpoint recorded {}",
                    self.meta.num_params
                ),
            )
            .into());
        }

        let record = load_record::<B, M::Record>(&self.slot.model_stem, device)?;
        let model = model.load_record(record);

        let loaded = model.num_params();
        if loaded != expected {
            return Err(TrainError::corrupt(
                self.slot.model_file().display(),
                format!("record holds {loaded} parameters, expected {expected}"),
            )
            .into());
        }

        let optim_record = load_record::<B, O::Record>(&self.slot.optim_stem, device)
            .with_context(|| format!("Optimizer state for '{}'", self.slot.name))?;
        let optim = optim.load_record(optim_record);

        tracing::info!("Restored {} parameters from '{}'", loaded, self.slot.model_file().display());
        Ok((model, optim))
    }
}
