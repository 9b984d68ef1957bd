//! Directed-graph executor for the synthesis workflow.
//!
//! The graph is fixed: Plan -> Retrieve -> Generate -> Accumulate ->
//! StaticGate -> (Execute | Generate) -> Critique -> (Retrieve |
//! TestSynthesis) -> Persist. Stages return partial updates, the engine
//! merges them and routes on the resulting status. A step ceiling bounds the
//! total number of transitions; hitting it is the only condition that aborts
//! a run outright.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::types::{StageUpdate, WorkflowState};
use crate::io::analyzer::Analyzer;
use crate::io::checkpoint::CheckpointStore;
use crate::io::generator::Generator;
use crate::io::sandbox::Sandbox;
use crate::stages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Plan,
    Retrieve,
    Generate,
    Accumulate,
    StaticGate,
    Execute,
    Critique,
    TestSynthesis,
    Persist,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Retrieve => "retrieve",
            Stage::Generate => "generate",
            Stage::Accumulate => "accumulate",
            Stage::StaticGate => "static_gate",
            Stage::Execute => "execute",
            Stage::Critique => "critique",
            Stage::TestSynthesis => "test_synthesis",
            Stage::Persist => "persist",
        }
    }
}

/// The run hit the step ceiling. Recoverable by resuming from the last
/// checkpoint, which survives the abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursionExceededError {
    pub steps: u32,
    pub max_steps: u32,
}

impl fmt::Display for RecursionExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step ceiling reached after {} transitions (max {})",
            self.steps, self.max_steps
        )
    }
}

impl std::error::Error for RecursionExceededError {}

/// Drives the stage graph over one workflow state.
pub struct Engine<'a, G, A, S> {
    generator: &'a G,
    analyzer: &'a A,
    sandbox: &'a S,
    checkpoints: &'a CheckpointStore,
    workspace: &'a Path,
    max_steps: u32,
    max_retries: u32,
}

impl<'a, G: Generator, A: Analyzer, S: Sandbox> Engine<'a, G, A, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: &'a G,
        analyzer: &'a A,
        sandbox: &'a S,
        checkpoints: &'a CheckpointStore,
        workspace: &'a Path,
        max_steps: u32,
        max_retries: u32,
    ) -> Self {
        Self {
            generator,
            analyzer,
            sandbox,
            checkpoints,
            workspace,
            max_steps,
            max_retries,
        }
    }

    /// Run the graph to completion. Entry is planning for a fresh state and
    /// retrieval for a restored state that already carries tasks.
    pub fn run(&self, mut state: WorkflowState) -> Result<WorkflowState> {
        let mut stage = if state.tasks.is_empty() {
            Stage::Plan
        } else {
            info!(
                task = state.current_task_idx,
                tasks = state.tasks.len(),
                "resuming with existing plan"
            );
            Stage::Retrieve
        };

        let mut steps = 0u32;
        loop {
            if steps >= self.max_steps {
                warn!(steps, max_steps = self.max_steps, "step ceiling reached");
                return Err(RecursionExceededError {
                    steps,
                    max_steps: self.max_steps,
                }
                .into());
            }
            steps += 1;
            debug!(step = steps, stage = stage.name(), status = %state.status, "entering stage");

            let update = self.run_stage(stage, &state)?;
            state.apply(update);

            match self.route(stage, &state) {
                Some(next) => stage = next,
                None => {
                    info!(steps, status = %state.status, "workflow finished");
                    return Ok(state);
                }
            }
        }
    }

    fn run_stage(&self, stage: Stage, state: &WorkflowState) -> Result<StageUpdate> {
        match stage {
            Stage::Plan => stages::plan::run(state, self.generator, self.max_retries),
            Stage::Retrieve => stages::retrieve::run(state, self.workspace),
            Stage::Generate => stages::generate::run(state, self.generator, self.analyzer),
            Stage::Accumulate => stages::accumulate::run(state),
            Stage::StaticGate => stages::static_gate::run(state, self.analyzer),
            Stage::Execute => stages::execute::run(state, self.analyzer, self.sandbox),
            Stage::Critique => stages::critique::run(state, self.checkpoints),
            Stage::TestSynthesis => stages::test_synthesis::run(state, self.generator),
            Stage::Persist => stages::persist::run(state, self.workspace),
        }
    }

    fn route(&self, stage: Stage, state: &WorkflowState) -> Option<Stage> {
        let next = match stage {
            Stage::Plan => Stage::Retrieve,
            Stage::Retrieve => Stage::Generate,
            Stage::Generate => Stage::Accumulate,
            Stage::Accumulate => Stage::StaticGate,
            Stage::StaticGate => match state.status.as_str() {
                "static_check_failed" => Stage::Generate,
                "static_check_passed" => Stage::Execute,
                other => {
                    warn!(status = other, "unexpected status after static gate");
                    Stage::Execute
                }
            },
            Stage::Execute => Stage::Critique,
            Stage::Critique => {
                if state.current_task_idx >= state.tasks.len() {
                    Stage::TestSynthesis
                } else {
                    Stage::Retrieve
                }
            }
            Stage::TestSynthesis => Stage::Persist,
            Stage::Persist => return None,
        };
        Some(next)
    }
}
