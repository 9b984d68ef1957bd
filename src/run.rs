//! Orchestration for `codeloom run`: session setup, checkpoint restore, and
//! engine execution.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::types::WorkflowState;
use crate::engine::Engine;
use crate::io::analyzer::CommandAnalyzer;
use crate::io::checkpoint::CheckpointStore;
use crate::io::config::load_config;
use crate::io::generator::CommandGenerator;
use crate::io::sandbox::CommandSandbox;
use crate::io::session::{SessionInfo, SessionStore};

/// Everything `codeloom run` needs from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub requirements_path: PathBuf,
    pub session_id: Option<String>,
    pub resume: bool,
    pub from_checkpoint: Option<usize>,
    pub workspaces_dir: PathBuf,
    pub config_path: PathBuf,
}

/// Outcome of a finished run, for CLI reporting.
#[derive(Debug)]
pub struct RunReport {
    pub session_id: String,
    pub workspace: PathBuf,
    pub state: WorkflowState,
}

pub fn run(options: &RunOptions) -> Result<RunReport> {
    let config = load_config(&options.config_path)?;
    let requirements = fs::read_to_string(&options.requirements_path)
        .with_context(|| format!("read requirements {}", options.requirements_path.display()))?;
    let prd_name = prd_name(&options.requirements_path);

    let sessions = SessionStore::new(&options.workspaces_dir);
    let session = resolve_session(&sessions, &prd_name, options)?;
    let workspace = PathBuf::from(&session.workspace_path);
    let checkpoints = CheckpointStore::new(&workspace);

    let state = initial_state(&checkpoints, options, &requirements, config.max_retries);

    let generator = CommandGenerator::new(config.generator.clone(), config.output_limit_bytes);
    let analyzer = CommandAnalyzer::new(config.analyzer.clone(), config.output_limit_bytes);
    let sandbox = CommandSandbox::new(config.sandbox.clone(), config.output_limit_bytes);
    let engine = Engine::new(
        &generator,
        &analyzer,
        &sandbox,
        &checkpoints,
        &workspace,
        config.max_steps,
        config.max_retries,
    );

    match engine.run(state) {
        Ok(state) => {
            if let Err(err) = sessions.complete(&session.session_id, "complete") {
                warn!(err = %err, "failed to mark session complete");
            }
            Ok(RunReport {
                session_id: session.session_id,
                workspace,
                state,
            })
        }
        Err(err) => {
            if let Err(mark) = sessions.complete(&session.session_id, "failed") {
                warn!(err = %mark, "failed to mark session failed");
            }
            Err(err)
        }
    }
}

fn prd_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "requirements".to_string())
}

fn resolve_session(
    sessions: &SessionStore,
    prd_name: &str,
    options: &RunOptions,
) -> Result<SessionInfo> {
    if !options.resume {
        return sessions.create(prd_name, options.session_id.clone());
    }
    let session = match &options.session_id {
        Some(id) => sessions
            .get(id)?
            .ok_or_else(|| anyhow!("session '{id}' not found"))?,
        None => sessions
            .latest(prd_name)?
            .ok_or_else(|| anyhow!("no previous session found for '{prd_name}'"))?,
    };
    info!(session_id = %session.session_id, "resuming session");
    Ok(session)
}

/// Restore from a checkpoint when resuming; any restore trouble degrades to
/// a warning and a fresh state in the same workspace.
fn initial_state(
    checkpoints: &CheckpointStore,
    options: &RunOptions,
    requirements: &str,
    max_retries: u32,
) -> WorkflowState {
    if options.resume || options.from_checkpoint.is_some() {
        match checkpoints.load(options.from_checkpoint) {
            Ok(Some(checkpoint)) => {
                info!(
                    task_idx = checkpoint.task_idx,
                    tag = %checkpoint.tag,
                    "restored checkpoint"
                );
                return checkpoint.state;
            }
            Ok(None) => warn!("no checkpoint found, starting fresh"),
            Err(err) => warn!(err = %err, "checkpoint restore failed, starting fresh"),
        }
    }
    WorkflowState::new(requirements, max_retries)
}
