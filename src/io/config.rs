//! Orchestrator configuration, loaded from `codeloom.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Orchestrator configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values. Collaborator
/// commands may be left empty: the analyzer then degrades to
/// capability-absent reports and the generator falls back to default plans
/// and placeholder output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoomConfig {
    /// Retry budget per task before it is skipped or force-passed.
    pub max_retries: u32,

    /// Step ceiling: total stage transitions allowed in one run.
    pub max_steps: u32,

    /// Truncate collaborator stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub generator: CommandSpec,
    pub analyzer: CommandSpec,
    pub sandbox: CommandSpec,
}

/// One collaborator command: argv plus a wall-clock budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandSpec {
    /// Command to execute (e.g. `["codex", "exec"]`). Empty means
    /// unconfigured.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl CommandSpec {
    /// The program to spawn, when one is configured.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str).filter(|p| !p.trim().is_empty())
    }
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_steps: 100,
            output_limit_bytes: 100_000,
            generator: CommandSpec {
                command: Vec::new(),
                timeout_secs: 300,
            },
            analyzer: CommandSpec {
                command: Vec::new(),
                timeout_secs: 60,
            },
            sandbox: CommandSpec {
                command: Vec::new(),
                timeout_secs: 30,
            },
        }
    }
}

impl LoomConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (name, spec) in [
            ("generator", &self.generator),
            ("analyzer", &self.analyzer),
            ("sandbox", &self.sandbox),
        ] {
            if spec.timeout_secs == 0 {
                return Err(anyhow!("{name}.timeout_secs must be > 0"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoomConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoomConfig> {
    if !path.exists() {
        let cfg = LoomConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoomConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LoomConfig::default());
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.max_steps, 100);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("codeloom.toml");
        fs::write(
            &path,
            "max_retries = 5\n\n[generator]\ncommand = [\"codex\", \"exec\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.max_steps, 100);
        assert_eq!(cfg.generator.command, vec!["codex", "exec"]);
        assert_eq!(cfg.generator.timeout_secs, 60);
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("codeloom.toml");
        fs::write(&path, "max_steps = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn blank_program_counts_as_unconfigured() {
        let spec = CommandSpec {
            command: vec!["  ".to_string()],
            timeout_secs: 10,
        };
        assert!(spec.program().is_none());
        assert!(CommandSpec::default().program().is_none());
    }
}
