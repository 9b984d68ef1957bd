//! Retrieval stage: keyword scan over existing workspace files for context.
//!
//! Keywords are the first five whitespace tokens of the task description,
//! lowercased. Matches are capped in count and snippet length so the context
//! string stays bounded.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::extract::truncate_chars;
use crate::core::types::{StageUpdate, WorkflowState};

const MAX_MATCHES: usize = 5;
const SNIPPET_CHARS: usize = 500;
const SOURCE_EXTENSIONS: &[&str] = &["py", "js", "java", "md"];

pub fn run(state: &WorkflowState, workspace: &Path) -> Result<StageUpdate> {
    let idx = state.current_task_idx;
    let Some(task) = state.current_task() else {
        return Ok(StageUpdate {
            context: Some("No more tasks to process.".to_string()),
            status: Some(format!("retrieval_complete_task_{idx}")),
            ..StageUpdate::default()
        });
    };

    let keywords: Vec<String> = task
        .description
        .split_whitespace()
        .take(5)
        .map(str::to_lowercase)
        .collect();
    let context = search_workspace(workspace, &keywords);
    debug!(task = idx, context_chars = context.len(), "context retrieved");
    Ok(StageUpdate {
        context: Some(context),
        status: Some(format!("retrieval_complete_task_{idx}")),
        ..StageUpdate::default()
    })
}

fn search_workspace(workspace: &Path, keywords: &[String]) -> String {
    if !workspace.exists() {
        return "No existing workspace files found.".to_string();
    }
    let mut matches = Vec::new();
    collect_matches(workspace, keywords, &mut matches);
    if matches.is_empty() {
        return "No relevant files found in workspace.".to_string();
    }
    matches.join("\n---\n")
}

fn collect_matches(dir: &Path, keywords: &[String], matches: &mut Vec<String>) {
    if matches.len() >= MAX_MATCHES {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "unreadable directory during retrieval");
        return;
    };
    // Sorted traversal keeps retrieved context deterministic.
    let mut paths: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        if matches.len() >= MAX_MATCHES {
            return;
        }
        if path.is_dir() {
            collect_matches(&path, keywords, matches);
            continue;
        }
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SOURCE_EXTENSIONS.contains(&extension) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let lowered = content.to_lowercase();
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            matches.push(format!(
                "File: {}\n{}",
                path.display(),
                truncate_chars(&content, SNIPPET_CHARS)
            ));
        }
    }
}
