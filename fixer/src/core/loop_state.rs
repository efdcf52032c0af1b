//! Control-loop state machine.
//!
//! `Running(step)` advances one step per executed action. A Submit action ends the
//! run; running out of budget ends it without error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum LoopState {
    Running(u32),
    Submitted,
    Exhausted,
}

impl LoopState {
    pub fn start(max_steps: u32) -> Self {
        if max_steps == 0 {
            LoopState::Exhausted
        } else {
            LoopState::Running(0)
        }
    }

    /// State after the step just executed.
    pub fn advance(self, submitted: bool, max_steps: u32) -> Self {
        match self {
            LoopState::Running(_) if submitted => LoopState::Submitted,
            LoopState::Running(step) if step + 1 >= max_steps => LoopState::Exhausted,
            LoopState::Running(step) => LoopState::Running(step + 1),
            terminal => terminal,
        }
    }
}
