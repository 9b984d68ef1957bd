//! Workflow stages.
//!
//! Each stage is a function from the aggregate [`crate::core::types::WorkflowState`]
//! to a [`crate::core::types::StageUpdate`]. Stages never mutate state
//! directly; the engine merges their partial results and routes on the
//! resulting status.

pub mod accumulate;
pub mod critique;
pub mod execute;
pub mod generate;
pub mod persist;
pub mod plan;
pub mod retrieve;
pub mod static_gate;
pub mod test_synthesis;
