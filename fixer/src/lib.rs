//! Bug-fixing agent loop with a validated edit pipeline.
//!
//! An oracle picks one action per step (search, view a file, edit, submit);
//! the loop runs it against a working copy and feeds the observation back.
//! Edits only land on disk when they pass a static check.
//!
//! - **[`core`]**: pure logic (action types, trajectory, loop states, line
//!   arithmetic, outline rendering). No I/O.
//! - **[`io`]**: side effects (filesystem, git, linter and oracle subprocesses,
//!   prompts, config, step logs).
//! - **[`agents`]**: the oracle role traits and their executor-backed implementation.
//!
//! Orchestration modules ([`search`], [`view`], [`edit`], [`dispatch`],
//! [`looping`]) combine the two.

pub mod agents;
pub mod core;
pub mod dispatch;
pub mod edit;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod search;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod view;
