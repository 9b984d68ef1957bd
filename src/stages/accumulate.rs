//! Accumulation stage: the sole forward writer of file content.
//!
//! The generated snippet is appended speculatively, before any gate has
//! judged it. Rejection paths in the static gate and critique remove exactly
//! this snippet again via suffix rollback.

use anyhow::Result;
use tracing::{debug, info};

use crate::core::extract::{function_name, truncate_chars};
use crate::core::types::{FileState, StageUpdate, WorkflowState};

pub fn run(state: &WorkflowState) -> Result<StageUpdate> {
    let Some(task) = state.current_task() else {
        return Ok(StageUpdate::status("no_task"));
    };
    if state.generated_code.is_empty() {
        debug!(task = state.current_task_idx, "no code to accumulate");
        return Ok(StageUpdate::status("no_code"));
    }

    let mut file_map = state.file_map.clone();
    let file = file_map.entry(task.target.clone()).or_insert_with(|| {
        info!(target = %task.target, "creating file state for unplanned target");
        FileState::new(&task.target, truncate_chars(&task.description, 50))
    });

    if file.content.is_empty() {
        file.content = state.generated_code.clone();
    } else {
        file.content.push_str("\n\n");
        file.content.push_str(&state.generated_code);
    }

    if let Some(name) = function_name(&state.generated_code)
        && !file.functions.contains(&name)
    {
        debug!(function = %name, target = %task.target, "function recorded");
        file.functions.push(name);
    }

    Ok(StageUpdate {
        file_map: Some(file_map),
        status: Some("file_updated".to_string()),
        ..StageUpdate::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state_with_tasks, task};

    fn state_with_code(code: &str) -> WorkflowState {
        let mut state = state_with_tasks(vec![task(1, "calc.py", "Implement add")]);
        state.generated_code = code.to_string();
        state
    }

    #[test]
    fn first_snippet_becomes_the_file_content() {
        let state = state_with_code("def add(a, b):\n    return a + b");
        let update = run(&state).expect("accumulate");
        let file_map = update.file_map.expect("file map");
        assert_eq!(file_map["calc.py"].content, "def add(a, b):\n    return a + b");
        assert_eq!(file_map["calc.py"].functions, vec!["add"]);
        assert_eq!(update.status.as_deref(), Some("file_updated"));
    }

    #[test]
    fn later_snippets_append_with_a_blank_line() {
        let mut state = state_with_code("def sub(a, b):\n    return a - b");
        state
            .file_map
            .entry("calc.py".to_string())
            .or_insert_with(|| FileState::new("calc.py", "Calculator"))
            .content = "def add(a, b):\n    return a + b".to_string();

        let update = run(&state).expect("accumulate");
        let content = &update.file_map.expect("file map")["calc.py"].content;
        assert_eq!(
            content,
            "def add(a, b):\n    return a + b\n\ndef sub(a, b):\n    return a - b"
        );
    }

    #[test]
    fn duplicate_function_names_are_not_recorded_twice() {
        let mut state = state_with_code("def add(a, b):\n    return a + b");
        let mut file = FileState::new("calc.py", "Calculator");
        file.functions.push("add".to_string());
        state.file_map.insert("calc.py".to_string(), file);

        let update = run(&state).expect("accumulate");
        assert_eq!(update.file_map.expect("file map")["calc.py"].functions, vec!["add"]);
    }

    #[test]
    fn empty_snippet_is_a_no_op() {
        let state = state_with_code("");
        let update = run(&state).expect("accumulate");
        assert_eq!(update.status.as_deref(), Some("no_code"));
        assert!(update.file_map.is_none());
    }

    #[test]
    fn exhausted_tasks_short_circuit() {
        let mut state = state_with_code("def f():\n    pass");
        state.current_task_idx = 3;
        let update = run(&state).expect("accumulate");
        assert_eq!(update.status.as_deref(), Some("no_task"));
    }
}
