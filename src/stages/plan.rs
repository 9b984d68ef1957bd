//! Planning stage: decompose the requirements document into a file map and
//! an ordered task list.
//!
//! A failed or unparseable model response never aborts the run; planning
//! falls back to a single-file, single-task default plan.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::core::extract::{self, PlanResponse, truncate_chars};
use crate::core::types::{FileState, StageUpdate, Task, TaskAction, WorkflowState};
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::prompt::render_plan;

pub fn run<G: Generator>(
    state: &WorkflowState,
    generator: &G,
    max_retries: u32,
) -> Result<StageUpdate> {
    let (file_map, tasks) = match plan_with_generator(state, generator) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(err = %err, "planning failed, falling back to default plan");
            default_plan(&state.requirements)
        }
    };
    info!(files = file_map.len(), tasks = tasks.len(), "plan ready");
    Ok(StageUpdate {
        file_map: Some(file_map),
        tasks: Some(tasks),
        current_task_idx: Some(0),
        retry_count: Some(0),
        max_retries: Some(max_retries),
        status: Some("planning_complete".to_string()),
        ..StageUpdate::default()
    })
}

fn plan_with_generator<G: Generator>(
    state: &WorkflowState,
    generator: &G,
) -> Result<(BTreeMap<String, FileState>, Vec<Task>)> {
    let prompt = render_plan(&state.requirements)?;
    let raw = generator.complete(&GenerateRequest { prompt })?;
    let response = extract::extract_plan(&extract::strip_think_tags(&raw))
        .ok_or_else(|| anyhow!("plan response did not match the expected schema"))?;
    Ok(materialize(response))
}

fn materialize(response: PlanResponse) -> (BTreeMap<String, FileState>, Vec<Task>) {
    let mut tasks: Vec<Task> = response
        .tasks
        .iter()
        .map(|t| Task {
            id: t.task_id,
            target: t.target_file.clone(),
            action: t.action,
            description: t.description.clone(),
            completed: false,
            code_snippet: None,
        })
        .collect();

    // A plan with files but no tasks still yields work: one task per planned
    // function, or one per file when no functions were named.
    if tasks.is_empty() {
        let mut next_id = 1u32;
        for file in &response.files {
            if file.functions.is_empty() {
                tasks.push(Task {
                    id: next_id,
                    target: file.path.clone(),
                    action: TaskAction::Create,
                    description: format!("Implement {}: {}", file.path, file.purpose),
                    completed: false,
                    code_snippet: None,
                });
                next_id += 1;
                continue;
            }
            for (i, function) in file.functions.iter().enumerate() {
                tasks.push(Task {
                    id: next_id,
                    target: file.path.clone(),
                    action: if i == 0 {
                        TaskAction::Create
                    } else {
                        TaskAction::Append
                    },
                    description: format!("Implement function {} in {}", function, file.path),
                    completed: false,
                    code_snippet: None,
                });
                next_id += 1;
            }
        }
    }

    let file_map = response
        .files
        .into_iter()
        .map(|f| {
            let mut file = FileState::new(f.path.clone(), f.purpose);
            file.functions = f.functions;
            (f.path, file)
        })
        .collect();
    (file_map, tasks)
}

fn default_plan(requirements: &str) -> (BTreeMap<String, FileState>, Vec<Task>) {
    let mut file_map = BTreeMap::new();
    file_map.insert(
        "implementation.py".to_string(),
        FileState::new("implementation.py", "Implementation derived from requirements"),
    );
    let tasks = vec![Task {
        id: 1,
        target: "implementation.py".to_string(),
        action: TaskAction::Create,
        description: truncate_chars(requirements, 100),
        completed: false,
        code_snippet: None,
    }];
    (file_map, tasks)
}
