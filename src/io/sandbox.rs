//! Sandboxed test-runner collaborator.
//!
//! The sandbox receives `{code, test_code, target_file}` as JSON on stdin
//! and is expected to print a JSON array of test results. When the output is
//! not JSON a line-oriented `[PASS]`/`[FAIL]` fallback is scanned, matching
//! runners that only log. Timeouts map to a synthetic failing `test_timeout`
//! result so they feed the normal retry path.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::types::TestResult;
use crate::io::config::CommandSpec;
use crate::io::process::run_command_with_timeout;

#[derive(Serialize)]
struct SandboxWireRequest<'a> {
    code: &'a str,
    test_code: &'a str,
    target_file: &'a str,
}

/// One execution request: the accumulated code plus its companion tests.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub code: String,
    pub test_code: String,
    pub target_file: String,
}

/// Result of one sandbox invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutcome {
    pub results: Vec<TestResult>,
    /// Whether the runner process itself exited cleanly. Consulted when no
    /// per-test results came back.
    pub exit_success: bool,
}

/// Runs generated tests against generated code in isolation.
pub trait Sandbox {
    fn run_tests(&self, request: &SandboxRequest) -> Result<SandboxOutcome>;
}

/// Sandbox backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandSandbox {
    spec: CommandSpec,
    output_limit_bytes: usize,
}

impl CommandSandbox {
    pub fn new(spec: CommandSpec, output_limit_bytes: usize) -> Self {
        Self {
            spec,
            output_limit_bytes,
        }
    }
}

impl Sandbox for CommandSandbox {
    #[instrument(skip_all, fields(target_file = %request.target_file))]
    fn run_tests(&self, request: &SandboxRequest) -> Result<SandboxOutcome> {
        let program = self
            .spec
            .program()
            .ok_or_else(|| anyhow!("sandbox command not configured"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.spec.command[1..]);

        let wire = serde_json::to_vec(&SandboxWireRequest {
            code: &request.code,
            test_code: &request.test_code,
            target_file: &request.target_file,
        })
        .context("serialize request")?;

        let output = run_command_with_timeout(
            cmd,
            Some(&wire),
            Duration::from_secs(self.spec.timeout_secs),
            self.output_limit_bytes,
        )
        .context("run sandbox command")?;

        if output.timed_out {
            warn!(timeout_secs = self.spec.timeout_secs, "test run timed out");
            return Ok(SandboxOutcome {
                results: vec![TestResult {
                    name: "test_timeout".to_string(),
                    passed: false,
                    error_message: Some(format!(
                        "test execution timed out after {}s",
                        self.spec.timeout_secs
                    )),
                    traceback: None,
                }],
                exit_success: false,
            });
        }

        let results = parse_results(&output.stdout_text());
        debug!(
            results = results.len(),
            exit_code = ?output.status.code(),
            "sandbox finished"
        );
        Ok(SandboxOutcome {
            results,
            exit_success: output.status.success(),
        })
    }
}

fn parse_results(stdout: &str) -> Vec<TestResult> {
    if let Ok(results) = serde_json::from_str::<Vec<TestResult>>(stdout.trim()) {
        return results;
    }
    // Line fallback: "[PASS] test_name" / "[FAIL] test_name: message".
    let mut results = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("[PASS] ") {
            results.push(TestResult {
                name: rest.trim().to_string(),
                passed: true,
                error_message: None,
                traceback: None,
            });
        } else if let Some(rest) = line.strip_prefix("[FAIL] ") {
            let (name, message) = match rest.split_once(':') {
                Some((name, message)) => (name.trim(), Some(message.trim().to_string())),
                None => (rest.trim(), None),
            };
            results.push(TestResult {
                name: name.to_string(),
                passed: false,
                error_message: message,
                traceback: None,
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_sandbox_is_an_error() {
        let sandbox = CommandSandbox::new(CommandSpec::default(), 1024);
        let request = SandboxRequest {
            code: "x = 1".to_string(),
            test_code: "def test_x():\n    pass".to_string(),
            target_file: "f.py".to_string(),
        };
        assert!(sandbox.run_tests(&request).is_err());
    }

    #[test]
    fn json_results_are_preferred() {
        let stdout = r#"[{"name": "test_add", "passed": true},
                         {"name": "test_div", "passed": false, "error_message": "zero"}]"#;
        let results = parse_results(stdout);
        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert_eq!(results[1].error_message.as_deref(), Some("zero"));
    }

    #[test]
    fn line_fallback_parses_pass_and_fail() {
        let stdout = "running...\n[PASS] test_add\n[FAIL] test_div: division by zero\nnoise\n";
        let results = parse_results(stdout);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "test_add");
        assert!(results[0].passed);
        assert_eq!(results[1].name, "test_div");
        assert!(!results[1].passed);
        assert_eq!(
            results[1].error_message.as_deref(),
            Some("division by zero")
        );
    }

    #[test]
    fn unrecognized_output_yields_no_results() {
        assert!(parse_results("all good\n").is_empty());
    }
}
