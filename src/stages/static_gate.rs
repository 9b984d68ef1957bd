//! Static gate: syntax and lint must pass before an execution attempt is
//! spent on the snippet.
//!
//! On failure the snippet is rolled back and the retry count advances. When
//! the retry budget is already exhausted at failure time the gate force
//! passes: the task index advances with the content kept as-is, trading
//! polish for forward progress.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::feedback;
use crate::core::retry::next_retry_context;
use crate::core::rollback::rollback_file;
use crate::core::types::{
    AnalysisReport, ErrorKind, FeedbackResult, LintSeverity, StageUpdate, WorkflowState,
};
use crate::io::analyzer::Analyzer;

pub fn run<A: Analyzer>(state: &WorkflowState, analyzer: &A) -> Result<StageUpdate> {
    let idx = state.current_task_idx;
    let Some(task) = state.current_task() else {
        return Ok(StageUpdate::status("static_check_passed"));
    };
    let content = state
        .file_map
        .get(&task.target)
        .map(|f| f.content.as_str())
        .unwrap_or("");
    if content.is_empty() {
        // Nothing accumulated; let execute produce the failing feedback so
        // the retry path stays bounded.
        debug!(task = idx, "no content to check, passing through");
        return Ok(StageUpdate::status("static_check_passed"));
    }

    let report = match analyzer.analyze(content, &task.target) {
        Ok(report) => report,
        Err(err) => {
            warn!(err = %err, "static analysis unavailable, failing open");
            AnalysisReport::unavailable()
        }
    };
    let lint_passed = report.lint_passed();
    info!(
        task = idx,
        target = %task.target,
        syntax = report.syntax_valid,
        lint = lint_passed,
        findings = report.lint_findings.len(),
        "static analysis complete"
    );
    if !report.type_errors.is_empty() {
        // Advisory only.
        debug!(type_errors = report.type_errors.len(), "type findings recorded");
    }

    if report.syntax_valid && lint_passed {
        return Ok(StageUpdate {
            analysis: Some(Some(report)),
            status: Some("static_check_passed".to_string()),
            ..StageUpdate::default()
        });
    }

    if state.retry_count >= state.max_retries {
        warn!(
            task = idx,
            retries = state.retry_count,
            "retry budget exhausted at static gate, force-passing"
        );
        return Ok(StageUpdate {
            current_task_idx: Some(idx + 1),
            retry_count: Some(0),
            retry_context: Some(None),
            analysis: Some(None),
            status: Some("static_check_passed".to_string()),
            ..StageUpdate::default()
        });
    }

    let mut file_map = state.file_map.clone();
    if let Some(file) = file_map.get_mut(&task.target)
        && rollback_file(file, &state.generated_code)
    {
        debug!(
            target = %task.target,
            snippet_chars = state.generated_code.len(),
            "rolled back rejected snippet"
        );
    }

    let (kind, details) = classify_report(&report);
    let retry_context = next_retry_context(
        kind,
        state.generated_code.clone(),
        details,
        state.retry_count + 1,
        state.max_retries,
        state.retry_context.as_ref(),
    );
    info!(
        task = idx,
        attempt = state.retry_count + 1,
        max = state.max_retries,
        kind = kind.as_str(),
        "static gate failed, retrying generation"
    );
    Ok(StageUpdate {
        file_map: Some(file_map),
        retry_count: Some(state.retry_count + 1),
        retry_context: Some(Some(retry_context)),
        feedback: Some(feedback_from_report(&report)),
        status: Some("static_check_failed".to_string()),
        ..StageUpdate::default()
    })
}

fn classify_report(report: &AnalysisReport) -> (ErrorKind, String) {
    if !report.syntax_valid {
        return (ErrorKind::Syntax, report.syntax_errors.join("\n"));
    }
    let details: Vec<String> = report
        .lint_findings
        .iter()
        .filter(|f| f.severity == LintSeverity::Error)
        .take(5)
        .map(|f| format!("Line {}: [{}] {}", f.line, f.code, f.message))
        .collect();
    (ErrorKind::Lint, details.join("\n"))
}

fn feedback_from_report(report: &AnalysisReport) -> FeedbackResult {
    if !report.syntax_valid {
        feedback::syntax_failure(report.syntax_errors.clone())
    } else {
        feedback::lint_failure(report.lint_findings.clone())
    }
}
