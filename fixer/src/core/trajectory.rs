//! Append-only history of one agent run.

use serde::{Deserialize, Serialize};

use super::types::Action;

/// An executed step: the action the oracle asked for and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWithResult {
    pub action: Action,
    pub result: String,
}

/// Ordered (action, observation) pairs plus the learnings gathered along the way.
///
/// Fields are private so entries can only be appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trajectory {
    actions: Vec<ActionWithResult>,
    gained_knowledge: Vec<String>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: Action, result: impl Into<String>) {
        self.actions.push(ActionWithResult {
            action,
            result: result.into(),
        });
    }

    pub fn learn(&mut self, learning: impl Into<String>) {
        self.gained_knowledge.push(learning.into());
    }

    pub fn steps(&self) -> &[ActionWithResult] {
        &self.actions
    }

    pub fn learnings(&self) -> &[String] {
        &self.gained_knowledge
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
