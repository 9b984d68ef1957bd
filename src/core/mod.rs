//! Deterministic, pure logic shared by the orchestrator core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod extract;
pub mod feedback;
pub mod retry;
pub mod rollback;
pub mod types;
