//! Shared data model for the synthesis workflow.
//!
//! These types are the contract between stages and the unit of checkpoint
//! serialization. File maps use `BTreeMap` so serialized state and persisted
//! output are deterministic across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a task touches its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Create,
    Append,
    Modify,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Create => "create",
            TaskAction::Append => "append",
            TaskAction::Modify => "modify",
        }
    }
}

/// A unit of work targeting exactly one file with one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub target: String,
    pub action: TaskAction,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    /// The accepted snippet, recorded by critique when the task passes.
    #[serde(default)]
    pub code_snippet: Option<String>,
}

/// Accumulated source content and metadata for one workspace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub path: String,
    pub purpose: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub has_tests: bool,
}

impl FileState {
    pub fn new(path: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            purpose: purpose.into(),
            content: String::new(),
            functions: Vec::new(),
            has_tests: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
}

/// One finding from the lint dimension of static analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFinding {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    pub code: String,
    pub message: String,
    pub severity: LintSeverity,
}

/// Outcome of one test function run in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
}

/// Aggregated validation outcome for one generation attempt.
///
/// Gate precedence is structural: a syntax failure marks lint and tests
/// unevaluated, a lint failure marks tests unevaluated. Construct values
/// through [`crate::core::feedback`] so the precedence holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub syntax_valid: bool,
    #[serde(default)]
    pub syntax_errors: Vec<String>,
    pub lint_passed: bool,
    #[serde(default)]
    pub lint_errors: Vec<LintFinding>,
    pub tests_passed: bool,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    pub overall_passed: bool,
    pub summary: String,
}

/// Failure class carried into the next generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Syntax,
    Lint,
    Test,
    Runtime,
    StaticCheck,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Lint => "lint",
            ErrorKind::Test => "test",
            ErrorKind::Runtime => "runtime",
            ErrorKind::StaticCheck => "static_check",
        }
    }
}

/// Structured explanation of the most recent failure, rendered into the
/// retry section of the generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    pub error_kind: ErrorKind,
    pub failed_code: String,
    pub error_details: String,
    pub attempt: u32,
    pub max_attempts: u32,
    /// Prior attempts' error details, oldest first, bounded to the last 3.
    #[serde(default)]
    pub previous_errors: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Static-analysis report with embedded capability detection.
///
/// Absent tools yield empty findings rather than failures: analysis
/// degrades, it does not block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_true")]
    pub syntax_valid: bool,
    #[serde(default)]
    pub syntax_errors: Vec<String>,
    #[serde(default)]
    pub lint_findings: Vec<LintFinding>,
    /// Advisory only; type errors never gate progress.
    #[serde(default)]
    pub type_errors: Vec<String>,
    #[serde(default = "default_true")]
    pub lint_available: bool,
    #[serde(default = "default_true")]
    pub types_available: bool,
}

impl AnalysisReport {
    /// Report used when no analyzer is configured: every capability absent,
    /// syntax fails open.
    pub fn unavailable() -> Self {
        Self {
            syntax_valid: true,
            syntax_errors: Vec::new(),
            lint_findings: Vec::new(),
            type_errors: Vec::new(),
            lint_available: false,
            types_available: false,
        }
    }

    /// True when no error-severity lint finding exists. Warnings pass.
    pub fn lint_passed(&self) -> bool {
        self.lint_findings
            .iter()
            .all(|f| f.severity != LintSeverity::Error)
    }
}

/// Aggregate workflow state, checkpointed at task boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub requirements: String,
    #[serde(default)]
    pub file_map: BTreeMap<String, FileState>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub current_task_idx: usize,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub generated_code: String,
    #[serde(default)]
    pub generated_test: String,
    #[serde(default)]
    pub feedback: Option<FeedbackResult>,
    #[serde(default)]
    pub analysis: Option<AnalysisReport>,
    #[serde(default)]
    pub retry_context: Option<RetryContext>,
    #[serde(default)]
    pub status: String,
    /// Logical path to absolute path of each file written by persist.
    #[serde(default)]
    pub final_files: BTreeMap<String, String>,
}

impl WorkflowState {
    pub fn new(requirements: impl Into<String>, max_retries: u32) -> Self {
        Self {
            requirements: requirements.into(),
            file_map: BTreeMap::new(),
            tasks: Vec::new(),
            current_task_idx: 0,
            retry_count: 0,
            max_retries,
            context: String::new(),
            generated_code: String::new(),
            generated_test: String::new(),
            feedback: None,
            analysis: None,
            retry_context: None,
            status: String::new(),
            final_files: BTreeMap::new(),
        }
    }

    /// The task at the current index, if any remain.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_idx)
    }

    /// Merge a stage's partial result. Present fields overwrite, absent
    /// fields leave the aggregate untouched.
    pub fn apply(&mut self, update: StageUpdate) {
        if let Some(v) = update.file_map {
            self.file_map = v;
        }
        if let Some(v) = update.tasks {
            self.tasks = v;
        }
        if let Some(v) = update.current_task_idx {
            self.current_task_idx = v;
        }
        if let Some(v) = update.retry_count {
            self.retry_count = v;
        }
        if let Some(v) = update.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = update.context {
            self.context = v;
        }
        if let Some(v) = update.generated_code {
            self.generated_code = v;
        }
        if let Some(v) = update.generated_test {
            self.generated_test = v;
        }
        if let Some(v) = update.feedback {
            self.feedback = Some(v);
        }
        if let Some(v) = update.analysis {
            self.analysis = v;
        }
        if let Some(v) = update.retry_context {
            self.retry_context = v;
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.final_files {
            self.final_files = v;
        }
    }
}

/// Partial state update produced by one stage.
///
/// `retry_context` and `analysis` are doubly optional: the outer `Option` is
/// presence of an update, the inner is the new value, so a stage can clear
/// them when a task boundary is crossed.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    pub file_map: Option<BTreeMap<String, FileState>>,
    pub tasks: Option<Vec<Task>>,
    pub current_task_idx: Option<usize>,
    pub retry_count: Option<u32>,
    pub max_retries: Option<u32>,
    pub context: Option<String>,
    pub generated_code: Option<String>,
    pub generated_test: Option<String>,
    pub feedback: Option<FeedbackResult>,
    pub analysis: Option<Option<AnalysisReport>>,
    pub retry_context: Option<Option<RetryContext>>,
    pub status: Option<String>,
    pub final_files: Option<BTreeMap<String, String>>,
}

impl StageUpdate {
    /// Update carrying only a status transition.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_overwrites_present_fields_only() {
        let mut state = WorkflowState::new("build a calculator", 3);
        state.context = "old context".to_string();
        state.retry_count = 2;

        state.apply(StageUpdate {
            retry_count: Some(0),
            status: Some("task_0_passed".to_string()),
            ..StageUpdate::default()
        });

        assert_eq!(state.retry_count, 0);
        assert_eq!(state.status, "task_0_passed");
        assert_eq!(state.context, "old context");
    }

    #[test]
    fn apply_clears_retry_context_via_inner_none() {
        let mut state = WorkflowState::new("req", 3);
        state.retry_context = Some(RetryContext {
            error_kind: ErrorKind::Test,
            failed_code: "def f(): pass".to_string(),
            error_details: "test_f: assertion failed".to_string(),
            attempt: 1,
            max_attempts: 3,
            previous_errors: Vec::new(),
        });

        state.apply(StageUpdate {
            retry_context: Some(None),
            ..StageUpdate::default()
        });
        assert!(state.retry_context.is_none());

        // Absent outer Option leaves the field alone.
        state.retry_context = Some(RetryContext {
            error_kind: ErrorKind::Lint,
            failed_code: String::new(),
            error_details: "E501".to_string(),
            attempt: 2,
            max_attempts: 3,
            previous_errors: Vec::new(),
        });
        state.apply(StageUpdate::default());
        assert!(state.retry_context.is_some());
    }

    #[test]
    fn lint_passed_ignores_warnings() {
        let mut report = AnalysisReport::unavailable();
        report.lint_findings.push(LintFinding {
            file: "calc.py".to_string(),
            line: 3,
            column: 1,
            code: "W291".to_string(),
            message: "trailing whitespace".to_string(),
            severity: LintSeverity::Warning,
        });
        assert!(report.lint_passed());

        report.lint_findings.push(LintFinding {
            file: "calc.py".to_string(),
            line: 7,
            column: 5,
            code: "F821".to_string(),
            message: "undefined name 'x'".to_string(),
            severity: LintSeverity::Error,
        });
        assert!(!report.lint_passed());
    }

    #[test]
    fn workflow_state_round_trips_through_json() {
        let mut state = WorkflowState::new("build a parser", 3);
        state.tasks.push(Task {
            id: 1,
            target: "parser.py".to_string(),
            action: TaskAction::Create,
            description: "Implement tokenize".to_string(),
            completed: true,
            code_snippet: Some("def tokenize(s):\n    return s.split()".to_string()),
        });
        state
            .file_map
            .insert("parser.py".to_string(), FileState::new("parser.py", "Parser"));
        state.status = "task_0_passed".to_string();

        let json = serde_json::to_string(&state).unwrap();
        let restored: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn task_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskAction::Create).unwrap(),
            "\"create\""
        );
        let action: TaskAction = serde_json::from_str("\"append\"").unwrap();
        assert_eq!(action, TaskAction::Append);
    }
}
