// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Durable run state for one run directory:
//
//   <run_dir>/
//     checkpoint.json            ← rolling slot meta, rewritten every epoch
//     checkpoint-model.mpk.gz    ← model record
//     checkpoint-optim.mpk.gz    ← optimizer record
//     model_best.json            ← copy of the rolling slot at the best epoch
//     model_best-model.mpk.gz
//     model_best-optim.mpk.gz
//     log.json                   ← RunLog paired with model_best
//
// Write order inside a slot: records first, meta last, so a meta
// file on disk implies its records are complete. JSON files are
// written to a temp file and renamed into place.
//
// Records use Burn's CompactRecorder (MessagePack + gzip).

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Record, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::domain::config::RunConfig;
use crate::domain::error::TrainError;
use crate::domain::run_log::RunLog;
use crate::domain::traits::EpochEngine;

pub const ROLLING_SLOT: &str = "checkpoint";
pub const BEST_SLOT:    &str = "model_best";
pub const LOG_FILE:     &str = "log.json";
const RECORD_EXT:       &str = "mpk.gz";

/// Metadata stored beside the model/optimizer records of a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Completed epochs; the next run starts at this zero-based index.
    /// Optional on read so a truncated file surfaces as CorruptArtifact.
    #[serde(default)]
    pub epoch:      Option<usize>,
    pub arch:       String,
    pub train_acc:  f64,
    pub valid_acc:  f64,
    pub num_params: usize,
}

/// File locations of one checkpoint slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotPaths {
    pub name:       String,
    pub meta:       PathBuf,
    pub model_stem: PathBuf,
    pub optim_stem: PathBuf,
}

impl SlotPaths {
    fn new(dir: &Path, name: &str) -> Self {
        Self {
            name:       name.to_string(),
            meta:       dir.join(format!("{name}.json")),
            model_stem: dir.join(format!("{name}-model")),
            optim_stem: dir.join(format!("{name}-optim")),
        }
    }

    pub fn model_file(&self) -> PathBuf {
        self.model_stem.with_extension(RECORD_EXT)
    }

    pub fn optim_file(&self) -> PathBuf {
        self.optim_stem.with_extension(RECORD_EXT)
    }

    pub fn is_best(&self) -> bool {
        self.name == BEST_SLOT
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Open (and create if needed) a run directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `<save_dir>/<dataset>/<input_type>/<arch_name>/<timestamp>`
    ///
    /// Runs started within the same second get a `_<n>` suffix.
    pub fn for_new_run(cfg: &RunConfig) -> Result<Self> {
        let parent = PathBuf::from(&cfg.save_dir)
            .join(&cfg.dataset)
            .join(cfg.input_type.as_str())
            .join(&cfg.arch_name);
        let stamp = chrono::Local::now().format("%Y_%m_%d_%H_%M_%S").to_string();

        let mut dir = parent.join(&stamp);
        let mut n = 1;
        while dir.exists() {
            dir = parent.join(format!("{stamp}_{n}"));
            n += 1;
        }
        tracing::info!("Run directory: '{}'", dir.display());
        Self::new(dir)
    }

    /// Resolve a user-supplied checkpoint path to its run directory and slot.
    ///
    /// Accepts the run directory itself (best slot), a slot meta file,
    /// or one of the slot's record files.
    pub fn locate(path: &Path) -> Result<(Self, SlotPaths)> {
        if path.is_dir() {
            let mgr = Self { dir: path.to_path_buf() };
            let slot = mgr.best_slot();
            return Ok((mgr, slot));
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| TrainError::corrupt(path.display(), "not a checkpoint file"))?;

        let stem = file.split('.').next().unwrap_or(file);
        let name = stem
            .strip_suffix("-model")
            .or_else(|| stem.strip_suffix("-optim"))
            .unwrap_or(stem);

        if name != ROLLING_SLOT && name != BEST_SLOT {
            return Err(TrainError::corrupt(
                path.display(),
                format!("expected a '{ROLLING_SLOT}' or '{BEST_SLOT}' slot, found '{name}'"),
            )
            .into());
        }

        let mgr = Self { dir };
        let slot = SlotPaths::new(&mgr.dir, name);
        Ok((mgr, slot))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn rolling_slot(&self) -> SlotPaths {
        SlotPaths::new(&self.dir, ROLLING_SLOT)
    }

    pub fn best_slot(&self) -> SlotPaths {
        SlotPaths::new(&self.dir, BEST_SLOT)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Write the rolling slot: records from the engine, then meta.
    pub fn save_rolling<E: EpochEngine + ?Sized>(&self, engine: &E, meta: &CheckpointMeta) -> Result<()> {
        let slot = self.rolling_slot();
        engine
            .save_weights(&slot.model_stem, &slot.optim_stem)
            .with_context(|| format!("Failed to save checkpoint records in '{}'", self.dir.display()))?;
        write_json_atomic(&slot.meta, meta)?;
        tracing::debug!("Saved rolling checkpoint (epoch {:?})", meta.epoch);
        Ok(())
    }

    /// Copy the rolling slot into the best slot, meta last.
    pub fn promote_best(&self) -> Result<()> {
        let from = self.rolling_slot();
        let to   = self.best_slot();
        for (src, dst) in [
            (from.model_file(), to.model_file()),
            (from.optim_file(), to.optim_file()),
            (from.meta.clone(), to.meta.clone()),
        ] {
            fs::copy(&src, &dst).with_context(|| {
                format!("Cannot copy '{}' to '{}'", src.display(), dst.display())
            })?;
        }
        tracing::debug!("Promoted rolling checkpoint to '{}'", to.meta.display());
        Ok(())
    }

    pub fn write_log(&self, log: &RunLog) -> Result<()> {
        write_json_atomic(&self.log_path(), log)?;
        tracing::debug!("Wrote run log for epoch {}", log.best.epoch);
        Ok(())
    }

    pub fn read_log(&self) -> Result<RunLog> {
        let path = self.log_path();
        read_json(&path).with_context(|| {
            format!("Cannot read run log '{}'. Is this a run directory?", path.display())
        })
    }

    pub fn read_meta(&self, slot: &SlotPaths) -> Result<CheckpointMeta> {
        read_json(&slot.meta)
            .with_context(|| format!("Cannot read checkpoint meta '{}'", slot.meta.display()))
    }
}

/// Save any Burn record (module or optimizer) under `stem`.
pub fn save_record<B: Backend, R: Record<B>>(record: R, stem: &Path) -> Result<()> {
    let recorder = CompactRecorder::new();
    <CompactRecorder as Recorder<B>>::record(&recorder, record, stem.to_path_buf())
        .map_err(|e| anyhow::anyhow!("Failed to save record to '{}': {e:?}", stem.display()))?;
    Ok(())
}

/// Load a Burn record saved with `save_record`.
pub fn load_record<B: Backend, R: Record<B>>(stem: &Path, device: &B::Device) -> Result<R, TrainError> {
    let recorder = CompactRecorder::new();
    <CompactRecorder as Recorder<B>>::load(&recorder, stem.to_path_buf(), device)
        .map_err(|e| TrainError::corrupt(stem.display(), format!("unreadable record: {e:?}")))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TrainError::corrupt(path.display(), "missing").into());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text).map_err(|e| TrainError::corrupt(path.display(), e.to_string()).into())
}
