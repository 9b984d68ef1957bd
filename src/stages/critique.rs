//! Critique stage: the per-task retry controller and checkpoint writer.
//!
//! On success the task is marked complete, its accepted snippet recorded,
//! and the post-advance state checkpointed. On failure within budget the
//! snippet is rolled back and a retry context built. On budget exhaustion
//! the task is skipped with content kept as-is.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::retry::{classify_failure, next_retry_context};
use crate::core::rollback::rollback_file;
use crate::core::types::{LintSeverity, StageUpdate, WorkflowState};
use crate::io::checkpoint::CheckpointStore;

pub fn run(state: &WorkflowState, checkpoints: &CheckpointStore) -> Result<StageUpdate> {
    let idx = state.current_task_idx;
    if idx >= state.tasks.len() {
        return Ok(StageUpdate::status("all_tasks_complete"));
    }
    let Some(fb) = &state.feedback else {
        warn!(task = idx, "no feedback available for critique");
        return Ok(StageUpdate {
            retry_count: Some(state.retry_count + 1),
            status: Some("error_no_result".to_string()),
            ..StageUpdate::default()
        });
    };

    if fb.overall_passed {
        let mut tasks = state.tasks.clone();
        tasks[idx].completed = true;
        tasks[idx].code_snippet = Some(state.generated_code.clone());
        let warnings = fb
            .lint_errors
            .iter()
            .filter(|f| f.severity == LintSeverity::Warning)
            .count();
        if warnings > 0 {
            debug!(task = idx, warnings, "task passed with lint warnings");
        }
        info!(task = idx, "task passed");

        // Snapshot the post-advance state so a restore resumes at the next
        // task boundary without replaying the one that just finished.
        let mut snapshot = state.clone();
        snapshot.tasks = tasks.clone();
        snapshot.current_task_idx = idx + 1;
        snapshot.retry_count = 0;
        snapshot.retry_context = None;
        snapshot.feedback = None;
        snapshot.analysis = None;
        snapshot.generated_code.clear();
        snapshot.generated_test.clear();
        snapshot.context.clear();
        snapshot.status = format!("task_{idx}_passed");
        if let Err(err) = checkpoints.save(&snapshot, idx, "completed") {
            warn!(task = idx, err = %err, "checkpoint save failed, continuing");
        }

        return Ok(StageUpdate {
            tasks: Some(tasks),
            current_task_idx: Some(idx + 1),
            retry_count: Some(0),
            retry_context: Some(None),
            analysis: Some(None),
            status: Some(format!("task_{idx}_passed")),
            ..StageUpdate::default()
        });
    }

    let (kind, details) = classify_failure(fb);
    if state.retry_count < state.max_retries {
        let mut file_map = state.file_map.clone();
        let target = &state.tasks[idx].target;
        if let Some(file) = file_map.get_mut(target)
            && rollback_file(file, &state.generated_code)
        {
            debug!(task = idx, target = %target, "rolled back failed snippet");
        }
        let attempt = state.retry_count + 1;
        let retry_context = next_retry_context(
            kind,
            state.generated_code.clone(),
            details,
            attempt,
            state.max_retries,
            state.retry_context.as_ref(),
        );
        info!(
            task = idx,
            attempt,
            max = state.max_retries,
            kind = kind.as_str(),
            summary = %fb.summary,
            "task failed, retrying"
        );
        return Ok(StageUpdate {
            file_map: Some(file_map),
            retry_count: Some(attempt),
            retry_context: Some(Some(retry_context)),
            status: Some(format!("task_{idx}_retry_{attempt}")),
            ..StageUpdate::default()
        });
    }

    warn!(
        task = idx,
        retries = state.retry_count,
        kind = kind.as_str(),
        "retry budget exhausted, skipping task"
    );
    Ok(StageUpdate {
        current_task_idx: Some(idx + 1),
        retry_count: Some(0),
        retry_context: Some(None),
        analysis: Some(None),
        status: Some(format!("task_{idx}_failed_max_retries")),
        ..StageUpdate::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feedback;
    use crate::core::types::{ErrorKind, FileState, TestResult};
    use crate::test_support::{failing_result, passing_result, state_with_tasks, task};

    fn judged_state(results: Vec<TestResult>) -> WorkflowState {
        let mut state = state_with_tasks(vec![
            task(1, "calc.py", "Implement add"),
            task(2, "calc.py", "Implement sub"),
        ]);
        let mut file = FileState::new("calc.py", "Calculator");
        file.content = "def add(a, b):\n    return a + b".to_string();
        state.file_map.insert("calc.py".to_string(), file);
        state.generated_code = "def add(a, b):\n    return a + b".to_string();
        state.feedback = Some(feedback::from_test_results(Vec::new(), results));
        state
    }

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn pass_advances_marks_complete_and_checkpoints() {
        let (_temp, checkpoints) = store();
        let state = judged_state(vec![passing_result("test_add")]);

        let update = run(&state, &checkpoints).expect("critique");
        assert_eq!(update.status.as_deref(), Some("task_0_passed"));
        assert_eq!(update.current_task_idx, Some(1));
        assert_eq!(update.retry_count, Some(0));
        assert_eq!(update.retry_context, Some(None));
        let tasks = update.tasks.expect("tasks");
        assert!(tasks[0].completed);
        assert_eq!(
            tasks[0].code_snippet.as_deref(),
            Some("def add(a, b):\n    return a + b")
        );

        let checkpoint = checkpoints.load(Some(0)).expect("load").expect("present");
        assert_eq!(checkpoint.tag, "completed");
        assert_eq!(checkpoint.state.current_task_idx, 1);
        assert_eq!(checkpoint.state.retry_count, 0);
        assert!(checkpoint.state.tasks[0].completed);
        assert!(checkpoint.state.generated_code.is_empty());
    }

    #[test]
    fn failure_within_budget_rolls_back_and_retries() {
        let (_temp, checkpoints) = store();
        let state = judged_state(vec![failing_result("test_add", "expected 3, got -1")]);

        let update = run(&state, &checkpoints).expect("critique");
        assert_eq!(update.status.as_deref(), Some("task_0_retry_1"));
        assert_eq!(update.retry_count, Some(1));
        assert!(update.file_map.expect("file map")["calc.py"].content.is_empty());
        let retry = update
            .retry_context
            .expect("update present")
            .expect("context present");
        assert_eq!(retry.error_kind, ErrorKind::Test);
        assert!(retry.error_details.contains("expected 3, got -1"));
        // No checkpoint for a failed attempt.
        assert!(checkpoints.load(Some(0)).expect("load").is_none());
    }

    #[test]
    fn retry_history_accumulates_across_attempts() {
        let (_temp, checkpoints) = store();
        let mut state = judged_state(vec![failing_result("test_add", "first failure")]);
        let update = run(&state, &checkpoints).expect("critique");
        state.apply(update);

        state.feedback = Some(feedback::from_test_results(
            Vec::new(),
            vec![failing_result("test_add", "second failure")],
        ));
        state.generated_code = "def add(a, b):\n    return a * b".to_string();
        let update = run(&state, &checkpoints).expect("critique");
        let retry = update
            .retry_context
            .expect("update present")
            .expect("context present");
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.previous_errors, vec!["test_add: first failure"]);
        assert!(retry.error_details.contains("second failure"));
    }

    #[test]
    fn exhausted_budget_skips_the_task() {
        let (_temp, checkpoints) = store();
        let mut state = judged_state(vec![failing_result("test_add", "still broken")]);
        state.retry_count = 3;

        let update = run(&state, &checkpoints).expect("critique");
        assert_eq!(update.status.as_deref(), Some("task_0_failed_max_retries"));
        assert_eq!(update.current_task_idx, Some(1));
        assert_eq!(update.retry_count, Some(0));
        assert_eq!(update.retry_context, Some(None));
        // Content is kept as-is; the skipped task's snippet stays.
        assert!(update.file_map.is_none());
        assert!(checkpoints.load(Some(0)).expect("load").is_none());
    }

    #[test]
    fn exhausted_task_list_reports_all_complete() {
        let (_temp, checkpoints) = store();
        let mut state = judged_state(Vec::new());
        state.current_task_idx = 2;
        let update = run(&state, &checkpoints).expect("critique");
        assert_eq!(update.status.as_deref(), Some("all_tasks_complete"));
    }

    #[test]
    fn missing_feedback_is_counted_against_the_budget() {
        let (_temp, checkpoints) = store();
        let mut state = judged_state(Vec::new());
        state.feedback = None;
        let update = run(&state, &checkpoints).expect("critique");
        assert_eq!(update.status.as_deref(), Some("error_no_result"));
        assert_eq!(update.retry_count, Some(1));
    }
}
