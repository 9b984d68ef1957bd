//! Test synthesis: one companion test file per produced source file.
//!
//! Runs once, after all tasks are resolved. Only top-level `def test_*`
//! functions are kept from the model output; a synthesis failure degrades to
//! a placeholder test file rather than aborting the run.

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::core::extract::{strip_think_tags, test_functions};
use crate::core::types::{FileState, StageUpdate, WorkflowState};
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::prompt::render_tests;
use crate::stages::generate::PLACEHOLDER_TEST;

pub fn run<G: Generator>(state: &WorkflowState, generator: &G) -> Result<StageUpdate> {
    let mut file_map = state.file_map.clone();
    let sources: Vec<(String, String)> = file_map
        .iter()
        .filter(|(path, file)| !is_test_file(path) && !file.content.is_empty())
        .map(|(path, file)| (path.clone(), file.content.clone()))
        .collect();
    info!(files = sources.len(), "synthesizing tests");

    for (path, content) in sources {
        let test_code = match synthesize(generator, &path, &content) {
            Ok(code) => code,
            Err(err) => {
                warn!(file = %path, err = %err, "test synthesis failed, using placeholder");
                format!("# Tests for {path}\n{PLACEHOLDER_TEST}")
            }
        };
        let test_path = test_file_path(&path);
        let entry = file_map
            .entry(test_path.clone())
            .or_insert_with(|| FileState::new(&test_path, format!("Tests for {path}")));
        entry.content = test_code;
        entry.has_tests = true;
        debug!(file = %path, test_file = %test_path, "tests written");
    }

    Ok(StageUpdate {
        file_map: Some(file_map),
        status: Some("tests_generated".to_string()),
        ..StageUpdate::default()
    })
}

fn synthesize<G: Generator>(generator: &G, path: &str, content: &str) -> Result<String> {
    let prompt = render_tests(path, content)?;
    let raw = generator.complete(&GenerateRequest { prompt })?;
    let functions = test_functions(&strip_think_tags(&raw));
    if functions.is_empty() {
        return Err(anyhow!("no test functions in response"));
    }
    Ok(functions.join("\n\n"))
}

fn is_test_file(path: &str) -> bool {
    path.starts_with("test_")
}

/// Companion test file path: `test_` prefix on the source path.
pub fn test_file_path(path: &str) -> String {
    format!("test_{path}")
}
