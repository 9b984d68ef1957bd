//! Static-analysis collaborator.
//!
//! The analyzer receives `{code, filename}` as JSON on stdin and replies with
//! an [`AnalysisReport`] as JSON on stdout. An unconfigured analyzer is not
//! an error: analysis degrades to a capability-absent report and syntax
//! fails open, so missing tooling never blocks the workflow.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::types::{AnalysisReport, LintFinding, LintSeverity};
use crate::io::config::CommandSpec;
use crate::io::process::run_command_with_timeout;

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    code: &'a str,
    filename: &'a str,
}

/// Runs syntax, lint, and type analysis over a code snapshot.
pub trait Analyzer {
    fn analyze(&self, code: &str, filename: &str) -> Result<AnalysisReport>;
}

/// Analyzer backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    spec: CommandSpec,
    output_limit_bytes: usize,
}

impl CommandAnalyzer {
    pub fn new(spec: CommandSpec, output_limit_bytes: usize) -> Self {
        Self {
            spec,
            output_limit_bytes,
        }
    }

    fn diagnostic_report(&self, filename: &str, code: &str, message: String) -> AnalysisReport {
        // Tool trouble surfaces as an error finding so the gate rejects the
        // attempt and the retry prompt carries the diagnostic.
        AnalysisReport {
            syntax_valid: true,
            syntax_errors: Vec::new(),
            lint_findings: vec![LintFinding {
                file: filename.to_string(),
                line: 0,
                column: 0,
                code: code.to_string(),
                message,
                severity: LintSeverity::Error,
            }],
            type_errors: Vec::new(),
            lint_available: true,
            types_available: false,
        }
    }
}

impl Analyzer for CommandAnalyzer {
    #[instrument(skip_all, fields(filename, code_chars = code.len()))]
    fn analyze(&self, code: &str, filename: &str) -> Result<AnalysisReport> {
        let Some(program) = self.spec.program() else {
            debug!("analyzer command not configured, skipping static analysis");
            return Ok(AnalysisReport::unavailable());
        };
        let mut cmd = Command::new(program);
        cmd.args(&self.spec.command[1..]);

        let request =
            serde_json::to_vec(&AnalyzeRequest { code, filename }).context("serialize request")?;
        let output = run_command_with_timeout(
            cmd,
            Some(&request),
            Duration::from_secs(self.spec.timeout_secs),
            self.output_limit_bytes,
        )
        .context("run analyzer command")?;

        if output.timed_out {
            warn!(timeout_secs = self.spec.timeout_secs, "analysis timed out");
            return Ok(self.diagnostic_report(
                filename,
                "TIMEOUT",
                format!("analysis timed out after {}s", self.spec.timeout_secs),
            ));
        }

        match serde_json::from_slice::<AnalysisReport>(&output.stdout) {
            Ok(report) => {
                debug!(
                    syntax = report.syntax_valid,
                    findings = report.lint_findings.len(),
                    type_errors = report.type_errors.len(),
                    "analysis complete"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(err = %err, "analyzer output was not a valid report");
                Ok(self.diagnostic_report(
                    filename,
                    "ANALYZER_ERROR",
                    format!(
                        "unparseable analyzer output: {}",
                        crate::core::extract::truncate_chars(&output.stdout_text(), 200)
                    ),
                ))
            }
        }
    }
}
