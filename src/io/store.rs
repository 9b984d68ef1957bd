//! Atomic file persistence shared by the io modules.
//!
//! All workflow artifacts are written via temp file + rename so a crash never
//! leaves a half-written checkpoint, registry, or output file behind.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Atomically write text, creating parent directories as needed.
pub fn write_text_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Atomically write a value as pretty JSON with a trailing newline.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    write_text_atomic(path, &buf)
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Seconds since the Unix epoch; zero if the clock is before it.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        count: u32,
    }

    #[test]
    fn json_round_trips_through_atomic_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("record.json");
        let record = Record {
            name: "calc".to_string(),
            count: 4,
        };
        write_json_atomic(&path, &record).expect("write");
        let loaded: Record = read_json(&path).expect("read");
        assert_eq!(loaded, record);
    }

    #[test]
    fn no_temp_file_remains_after_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.json");
        write_json_atomic(&path, &Record {
            name: "x".to_string(),
            count: 1,
        })
        .expect("write");
        assert!(path.exists());
        assert!(!temp.path().join("out.tmp").exists());
    }
}
