//! Isolated workspace sessions.
//!
//! Each run gets its own workspace directory under the sessions base so
//! concurrent or repeated runs never share files or checkpoints. The
//! registry at `sessions.json` is the single index of known sessions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::io::store::{unix_timestamp, write_json_atomic};

const REGISTRY_FILE: &str = "sessions.json";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Registry entry for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub workspace_path: String,
    /// Name of the requirements document this session serves.
    pub prd_name: String,
    pub created_at: u64,
    pub status: String,
    #[serde(default)]
    pub completed_at: Option<u64>,
}

/// Store rooted at a sessions base directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create a new session. The id defaults to `<prd_name>-<unix-seconds>`,
    /// with a numeric suffix when that id is already taken.
    pub fn create(&self, prd_name: &str, session_id: Option<String>) -> Result<SessionInfo> {
        let mut registry = self.load_registry()?;
        let base_id = session_id.unwrap_or_else(|| format!("{prd_name}-{}", unix_timestamp()));
        let id = unique_id(&base_id, &registry)?;

        let workspace = self.base_dir.join(&id);
        fs::create_dir_all(&workspace)
            .with_context(|| format!("create workspace {}", workspace.display()))?;

        let session = SessionInfo {
            session_id: id,
            workspace_path: workspace.display().to_string(),
            prd_name: prd_name.to_string(),
            created_at: unix_timestamp(),
            status: "active".to_string(),
            completed_at: None,
        };
        registry.push(session.clone());
        self.save_registry(&registry)?;
        info!(session_id = %session.session_id, "created session");
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        Ok(self
            .load_registry()?
            .into_iter()
            .find(|s| s.session_id == session_id))
    }

    /// Most recently created session for a requirements document.
    pub fn latest(&self, prd_name: &str) -> Result<Option<SessionInfo>> {
        Ok(self
            .load_registry()?
            .into_iter()
            .filter(|s| s.prd_name == prd_name)
            .max_by_key(|s| (s.created_at, s.session_id.clone())))
    }

    /// All sessions, newest first, optionally filtered by requirements name.
    pub fn list(&self, prd_name: Option<&str>) -> Result<Vec<SessionInfo>> {
        let mut sessions: Vec<SessionInfo> = self
            .load_registry()?
            .into_iter()
            .filter(|s| prd_name.is_none_or(|name| s.prd_name == name))
            .collect();
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        Ok(sessions)
    }

    /// Mark a session finished with the given terminal status.
    pub fn complete(&self, session_id: &str, status: &str) -> Result<()> {
        let mut registry = self.load_registry()?;
        let session = registry
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| anyhow!("session '{session_id}' not found"))?;
        session.status = status.to_string();
        session.completed_at = Some(unix_timestamp());
        self.save_registry(&registry)?;
        debug!(session_id, status, "session marked finished");
        Ok(())
    }

    /// Remove sessions created more than `days` ago, deleting their
    /// workspace directories. Returns the removed session ids.
    pub fn cleanup_older_than(&self, days: u64) -> Result<Vec<String>> {
        let cutoff = unix_timestamp().saturating_sub(days * SECONDS_PER_DAY);
        let registry = self.load_registry()?;
        let (stale, keep): (Vec<SessionInfo>, Vec<SessionInfo>) =
            registry.into_iter().partition(|s| s.created_at < cutoff);

        let mut removed = Vec::new();
        for session in &stale {
            let workspace = Path::new(&session.workspace_path);
            if workspace.exists()
                && let Err(err) = fs::remove_dir_all(workspace)
            {
                warn!(
                    session_id = %session.session_id,
                    err = %err,
                    "failed to remove workspace, keeping registry entry"
                );
                continue;
            }
            removed.push(session.session_id.clone());
        }
        let keep: Vec<SessionInfo> = keep
            .into_iter()
            .chain(
                stale
                    .into_iter()
                    .filter(|s| !removed.contains(&s.session_id)),
            )
            .collect();
        self.save_registry(&keep)?;
        info!(removed = removed.len(), "session cleanup finished");
        Ok(removed)
    }

    fn registry_path(&self) -> PathBuf {
        self.base_dir.join(REGISTRY_FILE)
    }

    /// Missing registry means no sessions. A corrupt registry is surfaced as
    /// an error rather than silently overwritten.
    fn load_registry(&self) -> Result<Vec<SessionInfo>> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    fn save_registry(&self, registry: &[SessionInfo]) -> Result<()> {
        write_json_atomic(&self.registry_path(), &registry)
    }
}

fn unique_id(base_id: &str, registry: &[SessionInfo]) -> Result<String> {
    let taken = |id: &str| registry.iter().any(|s| s.session_id == id);
    if !taken(base_id) {
        return Ok(base_id.to_string());
    }
    for n in 2..1000 {
        let candidate = format!("{base_id}-{n}");
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(anyhow!("could not find a unique session id for '{base_id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());

        let session = store.create("calculator", None).expect("create");
        assert!(session.session_id.starts_with("calculator-"));
        assert!(Path::new(&session.workspace_path).is_dir());

        let fetched = store
            .get(&session.session_id)
            .expect("get")
            .expect("present");
        assert_eq!(fetched, session);
        assert!(store.get("nope").expect("get").is_none());
    }

    #[test]
    fn explicit_ids_are_uniquified_on_collision() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());

        let first = store
            .create("calc", Some("calc-run".to_string()))
            .expect("create");
        let second = store
            .create("calc", Some("calc-run".to_string()))
            .expect("create");
        assert_eq!(first.session_id, "calc-run");
        assert_eq!(second.session_id, "calc-run-2");
    }

    #[test]
    fn latest_prefers_newest_then_highest_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());

        store.create("calc", Some("a".to_string())).expect("create");
        store.create("calc", Some("b".to_string())).expect("create");
        store
            .create("other", Some("c".to_string()))
            .expect("create");

        // Same created_at second is likely; the id tiebreak keeps it stable.
        let latest = store.latest("calc").expect("latest").expect("present");
        assert_eq!(latest.session_id, "b");
        assert!(store.latest("missing").expect("latest").is_none());
    }

    #[test]
    fn list_filters_by_prd_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());
        store.create("calc", Some("a".to_string())).expect("create");
        store
            .create("parser", Some("b".to_string()))
            .expect("create");

        assert_eq!(store.list(None).expect("list").len(), 2);
        let filtered = store.list(Some("calc")).expect("list");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].session_id, "a");
    }

    #[test]
    fn complete_sets_terminal_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());
        let session = store.create("calc", None).expect("create");

        store
            .complete(&session.session_id, "complete")
            .expect("complete");
        let fetched = store
            .get(&session.session_id)
            .expect("get")
            .expect("present");
        assert_eq!(fetched.status, "complete");
        assert!(fetched.completed_at.is_some());

        assert!(store.complete("nope", "failed").is_err());
    }

    #[test]
    fn cleanup_removes_only_stale_sessions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(temp.path());
        let old = store.create("calc", Some("old".to_string())).expect("create");
        store.create("calc", Some("new".to_string())).expect("create");

        // Backdate the old session by editing the registry directly.
        let mut registry = store.load_registry().expect("load");
        registry
            .iter_mut()
            .find(|s| s.session_id == "old")
            .expect("old session")
            .created_at = unix_timestamp() - 10 * SECONDS_PER_DAY;
        store.save_registry(&registry).expect("save");

        let removed = store.cleanup_older_than(7).expect("cleanup");
        assert_eq!(removed, vec!["old".to_string()]);
        assert!(!Path::new(&old.workspace_path).exists());
        assert!(store.get("old").expect("get").is_none());
        assert!(store.get("new").expect("get").is_some());
    }
}
