//! Filesystem checkpoint store for workflow snapshots.
//!
//! One record per completed task index plus a `latest.json` pointer record,
//! each holding the full serialized [`WorkflowState`]. Checkpoints are only
//! written at task boundaries, so a restored run always resumes at the start
//! of a task with a zero retry count.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::WorkflowState;
use crate::io::store::{read_json, unix_timestamp, write_json_atomic};

const LATEST_FILE: &str = "latest.json";

/// One durable snapshot of the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: u64,
    /// Index of the task whose completion produced this snapshot.
    pub task_idx: usize,
    pub tag: String,
    pub state: WorkflowState,
}

/// Checkpoint metadata without the state payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub file: String,
    pub task_idx: usize,
    pub timestamp: u64,
    pub tag: String,
}

/// Store rooted at `<workspace>/checkpoints`.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            dir: workspace.join("checkpoints"),
        }
    }

    /// Save a snapshot as `task_<idx>.json` and update the `latest.json`
    /// pointer. The per-task record is the durable one; a failed pointer
    /// update degrades to a warning.
    pub fn save(&self, state: &WorkflowState, task_idx: usize, tag: &str) -> Result<()> {
        let checkpoint = Checkpoint {
            timestamp: unix_timestamp(),
            task_idx,
            tag: tag.to_string(),
            state: state.clone(),
        };
        let path = self.dir.join(format!("task_{task_idx}.json"));
        write_json_atomic(&path, &checkpoint)
            .with_context(|| format!("save checkpoint {}", path.display()))?;
        if let Err(err) = write_json_atomic(&self.dir.join(LATEST_FILE), &checkpoint) {
            warn!(err = %err, "failed to update latest checkpoint pointer");
        }
        debug!(task_idx, tag, "checkpoint saved");
        Ok(())
    }

    /// Load the checkpoint for a task index, or the latest one when no index
    /// is given. A missing checkpoint is `None`, not an error.
    pub fn load(&self, task_idx: Option<usize>) -> Result<Option<Checkpoint>> {
        let path = match task_idx {
            Some(idx) => self.dir.join(format!("task_{idx}.json")),
            None => self.dir.join(LATEST_FILE),
        };
        if !path.exists() {
            debug!(path = %path.display(), "no checkpoint found");
            return Ok(None);
        }
        let checkpoint =
            read_json(&path).with_context(|| format!("load checkpoint {}", path.display()))?;
        Ok(Some(checkpoint))
    }

    /// Metadata for all per-task checkpoints, ordered by task index.
    /// Unreadable records are skipped with a warning.
    pub fn list(&self) -> Result<Vec<CheckpointInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut infos = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("read checkpoint dir {}", self.dir.display()))?
        {
            let entry = entry.context("read checkpoint dir entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("task_") || !name.ends_with(".json") {
                continue;
            }
            match read_json::<Checkpoint>(&entry.path()) {
                Ok(checkpoint) => infos.push(CheckpointInfo {
                    file: name,
                    task_idx: checkpoint.task_idx,
                    timestamp: checkpoint.timestamp,
                    tag: checkpoint.tag,
                }),
                Err(err) => warn!(file = %name, err = %err, "skipping unreadable checkpoint"),
            }
        }
        infos.sort_by_key(|info| info.task_idx);
        Ok(infos)
    }

    /// Highest task index with a checkpoint tagged "completed".
    pub fn last_completed_task(&self) -> Result<Option<usize>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|info| info.tag == "completed")
            .map(|info| info.task_idx)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WorkflowState {
        let mut state = WorkflowState::new("build a calculator", 3);
        state.status = "task_0_passed".to_string();
        state
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        let state = state();

        store.save(&state, 0, "completed").expect("save");
        let loaded = store.load(Some(0)).expect("load").expect("present");
        assert_eq!(loaded.task_idx, 0);
        assert_eq!(loaded.tag, "completed");
        assert_eq!(loaded.state, state);
    }

    #[test]
    fn latest_pointer_tracks_the_newest_save() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());

        store.save(&state(), 0, "completed").expect("save");
        store.save(&state(), 1, "completed").expect("save");
        let latest = store.load(None).expect("load").expect("present");
        assert_eq!(latest.task_idx, 1);
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        assert!(store.load(None).expect("load").is_none());
        assert!(store.load(Some(7)).expect("load").is_none());
    }

    #[test]
    fn list_orders_by_task_index_and_skips_latest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        store.save(&state(), 2, "completed").expect("save");
        store.save(&state(), 0, "completed").expect("save");

        let infos = store.list().expect("list");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].task_idx, 0);
        assert_eq!(infos[1].task_idx, 2);
    }

    #[test]
    fn last_completed_ignores_other_tags() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        store.save(&state(), 0, "completed").expect("save");
        store.save(&state(), 1, "completed").expect("save");
        store.save(&state(), 2, "failed").expect("save");

        assert_eq!(store.last_completed_task().expect("last"), Some(1));
    }

    #[test]
    fn empty_store_has_no_completed_task() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        assert_eq!(store.last_completed_task().expect("last"), None);
        assert!(store.list().expect("list").is_empty());
    }
}
