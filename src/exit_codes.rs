//! Stable exit codes for codeloom CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: bad arguments, missing session, step ceiling, or I/O error.
pub const FAILED: i32 = 1;
