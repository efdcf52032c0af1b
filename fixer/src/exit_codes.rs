//! Stable exit codes for fixer CLI commands.

/// Command succeeded; for `fixer run`, the agent submitted a fix.
pub const OK: i32 = 0;
/// Invalid input or config, or an error during the run.
pub const INVALID: i32 = 1;
/// `fixer run` used its whole step budget without submitting.
pub const EXHAUSTED: i32 = 2;
