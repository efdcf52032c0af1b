use serde::{Deserialize, Serialize};

use fixer::looping::LoopStop;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A prediction already existed and overwrite was off.
    Skipped,
    Submitted,
    Exhausted,
    Error,
}

impl Outcome {
    pub fn from_stop(stop: &LoopStop) -> Self {
        match stop {
            LoopStop::Submitted { .. } => Outcome::Submitted,
            LoopStop::Exhausted { .. } => Outcome::Exhausted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Submitted => "submitted",
            Outcome::Exhausted => "exhausted",
            Outcome::Error => "error",
        }
    }
}
