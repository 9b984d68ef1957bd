//! Deterministic collaborators and state builders for tests.
//!
//! Only compiled for tests or with the `test-support` feature.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::{
    AnalysisReport, LintFinding, LintSeverity, Task, TaskAction, TestResult, WorkflowState,
};
use crate::io::analyzer::Analyzer;
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::sandbox::{Sandbox, SandboxOutcome, SandboxRequest};

/// One scripted generator turn: a response or a failure.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Text(String),
    Fail(String),
}

impl ScriptedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Generator that replays scripted responses in order and errors when the
/// script runs out, so tests notice unexpected extra calls.
pub struct ScriptedGenerator {
    responses: RefCell<VecDeque<ScriptedResponse>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
        }
    }
}

impl Generator for ScriptedGenerator {
    fn complete(&self, _request: &GenerateRequest) -> Result<String> {
        match self.responses.borrow_mut().pop_front() {
            Some(ScriptedResponse::Text(text)) => Ok(text),
            Some(ScriptedResponse::Fail(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted generator exhausted")),
        }
    }
}

/// Analyzer returning the same report (or error) for every call.
pub struct FixedAnalyzer {
    report: Option<AnalysisReport>,
}

impl FixedAnalyzer {
    /// All checks pass, all capabilities present.
    pub fn clean() -> Self {
        Self {
            report: Some(AnalysisReport {
                syntax_valid: true,
                syntax_errors: Vec::new(),
                lint_findings: Vec::new(),
                type_errors: Vec::new(),
                lint_available: true,
                types_available: true,
            }),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self {
            report: Some(AnalysisReport {
                syntax_valid: false,
                syntax_errors: vec![message.into()],
                lint_findings: Vec::new(),
                type_errors: Vec::new(),
                lint_available: true,
                types_available: true,
            }),
        }
    }

    pub fn lint_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            report: Some(AnalysisReport {
                syntax_valid: true,
                syntax_errors: Vec::new(),
                lint_findings: vec![LintFinding {
                    file: "generated".to_string(),
                    line: 1,
                    column: 1,
                    code: code.into(),
                    message: message.into(),
                    severity: LintSeverity::Error,
                }],
                type_errors: Vec::new(),
                lint_available: true,
                types_available: true,
            }),
        }
    }

    /// Every call fails, exercising fail-open paths.
    pub fn erroring() -> Self {
        Self { report: None }
    }
}

impl Analyzer for FixedAnalyzer {
    fn analyze(&self, _code: &str, _filename: &str) -> Result<AnalysisReport> {
        match &self.report {
            Some(report) => Ok(report.clone()),
            None => Err(anyhow!("scripted analyzer failure")),
        }
    }
}

/// Sandbox replaying scripted outcomes, then an always-pass default when
/// constructed via [`ScriptedSandbox::passing`], otherwise an error.
pub struct ScriptedSandbox {
    outcomes: RefCell<VecDeque<SandboxOutcome>>,
    default_pass: bool,
    erroring: bool,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<SandboxOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            default_pass: false,
            erroring: false,
        }
    }

    /// Every call passes with a single placeholder result.
    pub fn passing() -> Self {
        Self {
            outcomes: RefCell::new(VecDeque::new()),
            default_pass: true,
            erroring: false,
        }
    }

    /// Every call fails with an error.
    pub fn erroring() -> Self {
        Self {
            outcomes: RefCell::new(VecDeque::new()),
            default_pass: false,
            erroring: true,
        }
    }
}

impl Sandbox for ScriptedSandbox {
    fn run_tests(&self, _request: &SandboxRequest) -> Result<SandboxOutcome> {
        if self.erroring {
            return Err(anyhow!("scripted sandbox failure"));
        }
        if let Some(outcome) = self.outcomes.borrow_mut().pop_front() {
            return Ok(outcome);
        }
        if self.default_pass {
            return Ok(SandboxOutcome {
                results: vec![passing_result("test_placeholder")],
                exit_success: true,
            });
        }
        Err(anyhow!("scripted sandbox exhausted"))
    }
}

/// A passing test result.
pub fn passing_result(name: &str) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed: true,
        error_message: None,
        traceback: None,
    }
}

/// A failing test result with an error message.
pub fn failing_result(name: &str, message: &str) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed: false,
        error_message: Some(message.to_string()),
        traceback: None,
    }
}

/// An incomplete task targeting one file.
pub fn task(id: u32, target: &str, description: &str) -> Task {
    Task {
        id,
        target: target.to_string(),
        action: if id == 1 {
            TaskAction::Create
        } else {
            TaskAction::Append
        },
        description: description.to_string(),
        completed: false,
        code_snippet: None,
    }
}

/// Fresh state positioned at the first of the given tasks.
pub fn state_with_tasks(tasks: Vec<Task>) -> WorkflowState {
    let mut state = WorkflowState::new("requirements", 3);
    state.tasks = tasks;
    state
}

/// A structured generation response as raw JSON text.
pub fn generate_json(code: &str, test_code: &str) -> String {
    serde_json::json!({
        "code": code,
        "test_code": test_code,
        "imports": [],
    })
    .to_string()
}
