//! File-backed checkpoint store

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ql::prelude::ValueModel;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECKPOINT: &str = "model";
const CHECKPOINT_EXTENSION: &str = "safetensors";
const PROGRESS_FILE: &str = "progress.json";

/// Checkpoint name for a new record
pub fn record_name(score: u32) -> String { format!("record_{}", score) }

/// Named model checkpoints inside one directory.
///
/// Name `n` lives in `<dir>/<n>.safetensors`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn path(
        &self,
        name: &str,
    ) -> PathBuf {
        self.dir.join(format!("{}.{}", name, CHECKPOINT_EXTENSION))
    }

    pub fn exists(
        &self,
        name: &str,
    ) -> bool {
        self.path(name).is_file()
    }

    pub fn save<M: ValueModel>(
        &self,
        model: &M,
        name: &str,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
        let file = self.path(name);
        model.write_checkpoint(&file).with_context(|| format!("writing checkpoint {}", file.display()))?;
        log::debug!("saved checkpoint {}", file.display());
        Ok(())
    }

    /// Returns `Ok(false)` when there is no such checkpoint; the model stays untouched then.
    pub fn load<M: ValueModel>(
        &self,
        model: &mut M,
        name: &str,
    ) -> Result<bool> {
        let file = self.path(name);
        if !file.is_file() {
            return Ok(false);
        }
        model.read_checkpoint(&file).with_context(|| format!("reading checkpoint {}", file.display()))?;
        log::info!("loaded checkpoint {}", file.display());
        Ok(true)
    }

    pub fn save_progress(
        &self,
        progress: &TrainingProgress,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
        let file = self.dir.join(PROGRESS_FILE);
        fs::write(&file, serde_json::to_string_pretty(progress)?).with_context(|| format!("writing {}", file.display()))
    }

    pub fn load_progress(&self) -> Result<Option<TrainingProgress>> {
        let file = self.dir.join(PROGRESS_FILE);
        if !file.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
        Ok(Some(serde_json::from_str(&content).with_context(|| format!("parsing {}", file.display()))?))
    }
}

/// Episode counter and record, restored on startup when progress resumption is switched on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub games_played: usize,
    pub record: u32,
}
