//! I/O helpers for the orchestrator: persistence, sessions, child processes,
//! and the collaborator commands.

pub mod analyzer;
pub mod checkpoint;
pub mod config;
pub mod generator;
pub mod process;
pub mod prompt;
pub mod sandbox;
pub mod session;
pub mod store;
