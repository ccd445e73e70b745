//! Parameter Checkpointing
//!
//! Periodic persistence of the global parameters keyed by episode number,
//! with bounded retention. Restore picks up the latest snapshot and
//! resumes the episode counter from it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PitError, Result};
use crate::model::ParameterSet;

/// One persisted training snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCheckpoint {
    /// Episodes completed when the snapshot was taken
    pub episode: u64,
    /// Wall-clock time of the write
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Global parameters at that point
    pub params: ParameterSet,
}

/// Writes and restores checkpoints in one directory.
pub struct Checkpointer {
    checkpoint_dir: PathBuf,
    max_checkpoints: usize,
}

impl Checkpointer {
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }

        Self {
            checkpoint_dir,
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    /// Path of the snapshot for a given episode count.
    pub fn checkpoint_path(&self, episode: u64) -> PathBuf {
        self.checkpoint_dir.join(format!("policy_ep{:08}.json", episode))
    }

    /// Persist a snapshot, then prune the oldest beyond the retention cap.
    pub fn save(&self, episode: u64, params: &ParameterSet) -> Result<PathBuf> {
        let path = self.checkpoint_path(episode);
        let checkpoint = TrainingCheckpoint {
            episode,
            created_at: chrono::Utc::now(),
            params: params.clone(),
        };

        let encoded = serde_json::to_vec(&checkpoint)
            .map_err(|e| PitError::Checkpoint(format!("encode failed: {}", e)))?;
        fs::write(&path, encoded)
            .map_err(|e| PitError::Checkpoint(format!("write {} failed: {}", path.display(), e)))?;

        self.cleanup_old_checkpoints();
        Ok(path)
    }

    /// Episode numbers with a snapshot on disk, ascending.
    pub fn list_checkpoints(&self) -> Vec<u64> {
        let mut episodes = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(episode) = parse_checkpoint_name(name) {
                        episodes.push(episode);
                    }
                }
            }
        }

        episodes.sort_unstable();
        episodes
    }

    /// Latest snapshot's episode number, if any.
    pub fn latest_checkpoint(&self) -> Option<u64> {
        self.list_checkpoints().into_iter().last()
    }

    /// Load the snapshot for a specific episode count.
    pub fn load(&self, episode: u64) -> Result<TrainingCheckpoint> {
        let path = self.checkpoint_path(episode);
        let bytes = fs::read(&path)
            .map_err(|e| PitError::Checkpoint(format!("read {} failed: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PitError::Checkpoint(format!("decode {} failed: {}", path.display(), e)))
    }

    /// Load the latest snapshot, if one exists.
    pub fn load_latest(&self) -> Result<Option<TrainingCheckpoint>> {
        match self.latest_checkpoint() {
            Some(episode) => self.load(episode).map(Some),
            None => Ok(None),
        }
    }

    fn cleanup_old_checkpoints(&self) {
        let episodes = self.list_checkpoints();

        if episodes.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = episodes.len() - self.max_checkpoints;
        for episode in episodes.into_iter().take(to_remove) {
            let path = self.checkpoint_path(episode);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old checkpoint {:?}: {}", path, e);
            } else {
                info!("Removed old checkpoint: {}", path.display());
            }
        }
    }
}

fn parse_checkpoint_name(name: &str) -> Option<u64> {
    name.strip_prefix("policy_ep")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
