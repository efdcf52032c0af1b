//! Deterministic, pure logic shared by the fixer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod loop_state;
pub mod outline;
pub mod trajectory;
pub mod types;
pub mod window;
