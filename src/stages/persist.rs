//! Persistence stage: write accumulated files into the workspace plus a
//! machine-readable run summary.
//!
//! Empty files are skipped. Every write is atomic, and the summary is the
//! last artifact written so its presence implies a complete output set.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::types::{StageUpdate, WorkflowState};
use crate::io::store::{write_json_atomic, write_text_atomic};

const SUMMARY_FILE: &str = "summary.json";

/// Machine-readable run summary written next to the output files.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub files: Vec<FileSummary>,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub purpose: String,
    pub functions: Vec<String>,
    pub size_bytes: usize,
    pub has_tests: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub id: u32,
    pub target: String,
    pub description: String,
    pub completed: bool,
}

pub fn run(state: &WorkflowState, workspace: &Path) -> Result<StageUpdate> {
    let mut final_files = BTreeMap::new();
    for (path, file) in &state.file_map {
        if file.content.is_empty() {
            debug!(file = %path, "skipping empty file");
            continue;
        }
        let dest = workspace.join(path);
        write_text_atomic(&dest, &file.content)
            .with_context(|| format!("write output file {}", dest.display()))?;
        info!(
            file = %path,
            chars = file.content.len(),
            functions = file.functions.len(),
            "file saved"
        );
        final_files.insert(path.clone(), dest.display().to_string());
    }

    let summary = build_summary(state);
    let summary_path = workspace.join(SUMMARY_FILE);
    write_json_atomic(&summary_path, &summary)
        .with_context(|| format!("write summary {}", summary_path.display()))?;
    final_files.insert(SUMMARY_FILE.to_string(), summary_path.display().to_string());

    info!(
        files = final_files.len(),
        completed = summary.completed_tasks,
        total = summary.total_tasks,
        "run persisted"
    );
    Ok(StageUpdate {
        final_files: Some(final_files),
        status: Some("complete".to_string()),
        ..StageUpdate::default()
    })
}

fn build_summary(state: &WorkflowState) -> RunSummary {
    let completed_tasks = state.tasks.iter().filter(|t| t.completed).count();
    RunSummary {
        total_tasks: state.tasks.len(),
        completed_tasks,
        failed_tasks: state.tasks.len() - completed_tasks,
        files: state
            .file_map
            .values()
            .filter(|f| !f.content.is_empty())
            .map(|f| FileSummary {
                path: f.path.clone(),
                purpose: f.purpose.clone(),
                functions: f.functions.clone(),
                size_bytes: f.content.len(),
                has_tests: f.has_tests,
            })
            .collect(),
        tasks: state
            .tasks
            .iter()
            .map(|t| TaskSummary {
                id: t.id,
                target: t.target.clone(),
                description: t.description.clone(),
                completed: t.completed,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FileState;
    use crate::test_support::{state_with_tasks, task};
    use serde_json::Value;

    fn persisted_state() -> WorkflowState {
        let mut state = state_with_tasks(vec![
            task(1, "calc.py", "Implement add"),
            task(2, "calc.py", "Implement sub"),
        ]);
        state.tasks[0].completed = true;
        let mut file = FileState::new("calc.py", "Calculator");
        file.content = "def add(a, b):\n    return a + b".to_string();
        file.functions = vec!["add".to_string()];
        state.file_map.insert("calc.py".to_string(), file);
        state
            .file_map
            .insert("notes.py".to_string(), FileState::new("notes.py", "Empty"));
        state
    }

    #[test]
    fn files_and_summary_land_in_the_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = persisted_state();

        let update = run(&state, temp.path()).expect("persist");
        assert_eq!(update.status.as_deref(), Some("complete"));
        let final_files = update.final_files.expect("final files");
        assert!(final_files.contains_key("calc.py"));
        assert!(final_files.contains_key("summary.json"));
        // Empty files are not written.
        assert!(!final_files.contains_key("notes.py"));
        assert!(!temp.path().join("notes.py").exists());

        let written = std::fs::read_to_string(temp.path().join("calc.py")).expect("read");
        assert_eq!(written, "def add(a, b):\n    return a + b");
    }

    #[test]
    fn summary_counts_completed_and_failed_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = persisted_state();
        run(&state, temp.path()).expect("persist");

        let summary: Value = serde_json::from_str(
            &std::fs::read_to_string(temp.path().join("summary.json")).expect("read"),
        )
        .expect("parse");
        assert_eq!(summary["total_tasks"], 2);
        assert_eq!(summary["completed_tasks"], 1);
        assert_eq!(summary["failed_tasks"], 1);
        assert_eq!(summary["files"][0]["path"], "calc.py");
        assert_eq!(summary["files"][0]["functions"][0], "add");
        assert_eq!(summary["tasks"][0]["completed"], true);
        assert_eq!(summary["tasks"][1]["completed"], false);
    }

    #[test]
    fn nested_paths_get_their_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut state = state_with_tasks(vec![task(1, "pkg/util.py", "Helpers")]);
        let mut file = FileState::new("pkg/util.py", "Helpers");
        file.content = "x = 1".to_string();
        state.file_map.insert("pkg/util.py".to_string(), file);

        run(&state, temp.path()).expect("persist");
        assert!(temp.path().join("pkg").join("util.py").exists());
    }
}
