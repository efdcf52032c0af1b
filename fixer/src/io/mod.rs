//! Side-effecting adapters: filesystem, git, subprocesses and the oracle backend.

pub mod config;
pub mod executor;
pub mod git;
pub mod lint;
pub mod process;
pub mod prompt;
pub mod step_log;
pub mod workspace;
