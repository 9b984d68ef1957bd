//! Generation stage: produce a code snippet and companion tests for the
//! current task.
//!
//! Structured JSON output is preferred and gets a syntax pre-check, since
//! JSON string escaping is where models most often corrupt code. When that
//! fails, the first fenced code block is the snippet and the second is the
//! test code. A generator failure degrades to an empty snippet so the retry
//! machinery downstream owns the recovery.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::extract;
use crate::core::types::{StageUpdate, WorkflowState};
use crate::io::analyzer::Analyzer;
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::prompt::{GeneratePromptInputs, render_generate};

/// Test code used when the model produced none.
pub const PLACEHOLDER_TEST: &str = "def test_placeholder():\n    pass";

pub fn run<G: Generator, A: Analyzer>(
    state: &WorkflowState,
    generator: &G,
    analyzer: &A,
) -> Result<StageUpdate> {
    let idx = state.current_task_idx;
    let Some(task) = state.current_task() else {
        return Ok(StageUpdate::status("no_more_tasks"));
    };
    let current_content = state
        .file_map
        .get(&task.target)
        .map(|f| f.content.as_str())
        .unwrap_or("");

    let prompt = render_generate(&GeneratePromptInputs {
        description: &task.description,
        target: &task.target,
        action: task.action.as_str(),
        current_content,
        context: &state.context,
        retry: state.retry_context.as_ref(),
    })?;

    info!(task = idx, target = %task.target, attempt = state.retry_count + 1, "generating code");
    let (code, test_code) = match generator.complete(&GenerateRequest { prompt }) {
        Ok(raw) => parse_response(&raw, analyzer, &task.target),
        Err(err) => {
            warn!(err = %err, "generator call failed, emitting empty snippet");
            (String::new(), PLACEHOLDER_TEST.to_string())
        }
    };
    debug!(code_chars = code.len(), test_chars = test_code.len(), "generation parsed");
    Ok(StageUpdate {
        generated_code: Some(code),
        generated_test: Some(test_code),
        status: Some(format!("code_generated_task_{idx}")),
        ..StageUpdate::default()
    })
}

fn parse_response<A: Analyzer>(raw: &str, analyzer: &A, filename: &str) -> (String, String) {
    let text = extract::strip_think_tags(raw);

    if let Some(response) = extract::extract_generated(&text) {
        if response.code.is_empty() || syntax_ok(analyzer, &response.code, filename) {
            if !response.imports.is_empty() {
                debug!(imports = ?response.imports, "response declared new imports");
            }
            let test_code = if response.test_code.is_empty() {
                PLACEHOLDER_TEST.to_string()
            } else {
                response.test_code
            };
            return (response.code, test_code);
        }
        warn!("structured output failed syntax pre-check, trying code blocks");
    }

    let blocks = extract::code_blocks(&text);
    let code = blocks.first().cloned().unwrap_or_default();
    let test_code = blocks
        .get(1)
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_TEST.to_string());
    (code, test_code)
}

fn syntax_ok<A: Analyzer>(analyzer: &A, code: &str, filename: &str) -> bool {
    match analyzer.analyze(code, filename) {
        Ok(report) => report.syntax_valid,
        Err(err) => {
            warn!(err = %err, "syntax pre-check unavailable, accepting structured output");
            true
        }
    }
}
