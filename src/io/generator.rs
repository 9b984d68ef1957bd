//! Generation collaborator.
//!
//! The [`Generator`] trait decouples stages from the model backend. The
//! production implementation spawns a configured command, feeds the rendered
//! prompt on stdin, and returns raw stdout text. Structured parsing and
//! fallback extraction happen in the stages via [`crate::core::extract`].

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::config::CommandSpec;
use crate::io::process::run_command_with_timeout;

/// A rendered prompt ready to send to the model.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Produces raw model text for a prompt.
pub trait Generator {
    fn complete(&self, request: &GenerateRequest) -> Result<String>;
}

/// Generator backed by an external command reading the prompt on stdin and
/// writing its response to stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    spec: CommandSpec,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(spec: CommandSpec, output_limit_bytes: usize) -> Self {
        Self {
            spec,
            output_limit_bytes,
        }
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(prompt_chars = request.prompt.len()))]
    fn complete(&self, request: &GenerateRequest) -> Result<String> {
        let program = self
            .spec
            .program()
            .ok_or_else(|| anyhow!("generator command not configured"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.spec.command[1..]);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            Duration::from_secs(self.spec.timeout_secs),
            self.output_limit_bytes,
        )?;

        if output.timed_out {
            return Err(anyhow!(
                "generator timed out after {}s",
                self.spec.timeout_secs
            ));
        }
        if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                stderr = %crate::core::extract::truncate_chars(&output.stderr_text(), 500),
                "generator command failed"
            );
            return Err(anyhow!(
                "generator exited with code {:?}",
                output.status.code()
            ));
        }
        debug!(response_chars = output.stdout.len(), "generator responded");
        Ok(output.stdout_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            prompt: "write a function".to_string(),
        }
    }

    #[test]
    fn unconfigured_command_is_an_error() {
        let generator = CommandGenerator::new(CommandSpec::default(), 1024);
        let err = generator.complete(&request()).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[cfg(unix)]
    #[test]
    fn stdout_of_the_command_is_the_response() {
        let generator = CommandGenerator::new(
            CommandSpec {
                command: vec!["cat".to_string()],
                timeout_secs: 5,
            },
            1024,
        );
        let response = generator.complete(&request()).expect("complete");
        assert_eq!(response, "write a function");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_an_error() {
        let generator = CommandGenerator::new(
            CommandSpec {
                command: vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
                timeout_secs: 5,
            },
            1024,
        );
        assert!(generator.complete(&request()).is_err());
    }
}
