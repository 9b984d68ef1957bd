//! Iterative code-synthesis orchestrator.
//!
//! codeloom turns a requirements document into file-scoped tasks and drives
//! each task through generation, static validation, sandboxed execution, and
//! critique until it passes or exhausts its retries. The crate enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, feedback
//!   construction, retry classification, rollback, response extraction).
//!   No I/O side effects.
//! - **[`io`]**: Side-effecting operations (checkpoints, sessions, config,
//!   child processes, collaborator commands).
//! - **[`stages`]**: The workflow stages, each a function from the aggregate
//!   state to a partial update.
//! - **[`engine`]**: The fixed stage graph, its routers, and the step ceiling.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
