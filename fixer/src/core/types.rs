//! Action and oracle-verdict types shared by the loop, the dispatcher and the oracle.
//!
//! The wire format keeps `action_name` and `action_input` as sibling fields. Decoding
//! goes through [`ActionWire`] so that a payload which does not match its tag is
//! rejected at the boundary instead of reaching the dispatcher.

use std::fmt;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Regex search over file contents and file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    pub regex: String,
}

/// View a file around a cursor line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFile {
    pub file_path: String,
    pub cursor_line: usize,
    pub before: usize,
    pub after: usize,
}

/// A single replacement request against the last observed line numbers of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub file_path: String,
    #[serde(default)]
    pub short_description: String,
    /// Literal text expected at `start_line..=end_line`.
    pub code_to_replace: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub new_code: String,
    // Self-attestation hints from the oracle. Passed through, never enforced.
    #[serde(default)]
    pub seen_all_needed_code: bool,
    #[serde(default)]
    pub no_other_file_viewing_needed: bool,
    #[serde(default)]
    pub edit_contains_all_needed_code: bool,
    #[serde(default)]
    pub no_unknowns: bool,
}

/// Ordered batch of edits. The first failure aborts the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edits {
    pub edits: Vec<Edit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub done: bool,
}

/// Closed set of actions the oracle may request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Search(Search),
    ViewFile(ViewFile),
    Edits(Edits),
    Submit(Submit),
}

/// Tag values as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Search,
    ViewFile,
    Edits,
    Submit,
}

impl ActionName {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::Search => "search",
            ActionName::ViewFile => "view_file",
            ActionName::Edits => "edits",
            ActionName::Submit => "submit",
        }
    }
}

impl ActionKind {
    pub fn name(&self) -> ActionName {
        match self {
            ActionKind::Search(_) => ActionName::Search,
            ActionKind::ViewFile(_) => ActionName::ViewFile,
            ActionKind::Edits(_) => ActionName::Edits,
            ActionKind::Submit(_) => ActionName::Submit,
        }
    }

    pub fn is_submit(&self) -> bool {
        matches!(self, ActionKind::Submit(_))
    }
}

/// One decision returned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionWire", into = "ActionWire")]
pub struct Action {
    pub thoughts: String,
    /// Optional fact about the repository worth remembering across steps.
    pub learning: Option<String>,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(thoughts: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            thoughts: thoughts.into(),
            learning: None,
            kind,
        }
    }

    pub fn with_learning(mut self, learning: impl Into<String>) -> Self {
        self.learning = Some(learning.into());
        self
    }

    pub fn name(&self) -> ActionName {
        self.kind.name()
    }
}

/// Serialized shape of [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionWire {
    pub thoughts: String,
    #[serde(default)]
    pub learning: Option<String>,
    pub action_name: ActionName,
    pub action_input: Value,
}

impl TryFrom<ActionWire> for Action {
    type Error = anyhow::Error;

    fn try_from(wire: ActionWire) -> Result<Self> {
        let name = wire.action_name;
        let input = wire.action_input;
        let kind = match name {
            ActionName::Search => ActionKind::Search(decode_input(name, input)?),
            ActionName::ViewFile => ActionKind::ViewFile(decode_input(name, input)?),
            ActionName::Edits => ActionKind::Edits(decode_input(name, input)?),
            ActionName::Submit => ActionKind::Submit(decode_input(name, input)?),
        };
        let learning = wire.learning.filter(|note| !note.trim().is_empty());
        Ok(Action {
            thoughts: wire.thoughts,
            learning,
            kind,
        })
    }
}

impl From<Action> for ActionWire {
    fn from(action: Action) -> Self {
        let action_name = action.kind.name();
        // Payload structs serialize infallibly into a JSON object.
        let action_input = match &action.kind {
            ActionKind::Search(input) => serde_json::to_value(input),
            ActionKind::ViewFile(input) => serde_json::to_value(input),
            ActionKind::Edits(input) => serde_json::to_value(input),
            ActionKind::Submit(input) => serde_json::to_value(input),
        }
        .unwrap_or(Value::Null);
        ActionWire {
            thoughts: action.thoughts,
            learning: action.learning,
            action_name,
            action_input,
        }
    }
}

fn decode_input<T: serde::de::DeserializeOwned>(name: ActionName, input: Value) -> Result<T> {
    serde_json::from_value(input).with_context(|| {
        format!(
            "action_input does not match action_name '{}'",
            name.as_str()
        )
    })
}

/// Parse an action from raw oracle JSON.
pub fn parse_action(raw: &str) -> Result<Action> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid action: {err}"))
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Searching for {}", self.regex)
    }
}

impl fmt::Display for ViewFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Viewing {} from {} |{}| {}.",
            self.file_path,
            self.cursor_line.saturating_sub(self.before),
            self.cursor_line,
            self.cursor_line.saturating_add(self.after)
        )
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EDIT: {} {}-{}\nREPLACE:\n{}\nWITH:\n{}",
            self.short_description,
            self.start_line,
            self.end_line,
            self.code_to_replace,
            self.new_code
        )
    }
}

impl fmt::Display for Edits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.edits.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("\n"))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Search(input) => input.fmt(f),
            ActionKind::ViewFile(input) => input.fmt(f),
            ActionKind::Edits(input) => input.fmt(f),
            ActionKind::Submit(input) => write!(f, "Submit (done={})", input.done),
        }
    }
}

/// Verdict of the evaluation gate on a pending action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub observations: String,
    pub right_track: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl Evaluation {
    /// Observation recorded in place of running a rejected action.
    pub fn rejection_notice(&self) -> String {
        let feedback = self
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("none");
        format!(
            "An evaluator thinks you're not on the right track:\nHere's what they think:\n{}\nEvaluator feedback: {feedback}\n\nThe action was not executed.",
            self.observations.trim()
        )
    }
}

/// Grade of a produced diff against the reference fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEvaluation {
    pub observations: String,
    /// 0..=10; 10 means the fix is certainly correct.
    pub score: u8,
    pub pass_tests: bool,
    pub correct: bool,
}

impl DiffEvaluation {
    pub fn validate(&self) -> Result<()> {
        if self.score > 10 {
            return Err(anyhow!("score must be within 0..=10, got {}", self.score));
        }
        Ok(())
    }
}

/// Review of a whole trajectory against the reference fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEvaluation {
    pub observations: String,
    pub feedback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_action() {
        let raw = r#"{"thoughts":"look","learning":null,"action_name":"search","action_input":{"regex":"def foo"}}"#;
        let action = parse_action(raw).expect("parse");
        assert_eq!(
            action.kind,
            ActionKind::Search(Search {
                regex: "def foo".to_string()
            })
        );
        assert_eq!(action.learning, None);
    }

    #[test]
    fn rejects_payload_that_does_not_match_tag() {
        let raw = r#"{"thoughts":"x","learning":null,"action_name":"view_file","action_input":{"regex":"a"}}"#;
        let err = parse_action(raw).unwrap_err();
        assert!(err.to_string().contains("view_file"), "{err}");
    }

    #[test]
    fn rejects_unknown_tag() {
        let raw = r#"{"thoughts":"x","action_name":"create_file","action_input":{}}"#;
        assert!(parse_action(raw).is_err());
    }

    #[test]
    fn blank_learning_is_dropped() {
        let raw = r#"{"thoughts":"x","learning":"  ","action_name":"submit","action_input":{"done":true}}"#;
        let action = parse_action(raw).expect("parse");
        assert_eq!(action.learning, None);
        assert!(action.kind.is_submit());
    }

    #[test]
    fn edit_flags_default_to_false() {
        let raw = r#"{"thoughts":"x","action_name":"edits","action_input":{"edits":[
            {"file_path":"a.py","code_to_replace":"x\n","start_line":1,"end_line":1,"new_code":"y\n"}
        ]}}"#;
        let action = parse_action(raw).expect("parse");
        let ActionKind::Edits(edits) = action.kind else {
            panic!("expected edits");
        };
        assert!(!edits.edits[0].no_unknowns);
        assert!(!edits.edits[0].seen_all_needed_code);
    }

    #[test]
    fn serializes_with_sibling_tag_and_payload() {
        let action = Action::new(
            "go",
            ActionKind::ViewFile(ViewFile {
                file_path: "a.py".to_string(),
                cursor_line: 10,
                before: 100,
                after: 100,
            }),
        );
        let value = serde_json::to_value(&action).expect("serialize");
        assert_eq!(value["action_name"], "view_file");
        assert_eq!(value["action_input"]["cursor_line"], 10);
    }

    #[test]
    fn view_display_saturates_large_margins() {
        let view = ViewFile {
            file_path: "a.py".to_string(),
            cursor_line: 1,
            before: 100,
            after: usize::MAX,
        };
        assert_eq!(
            view.to_string(),
            format!("Viewing a.py from 0 |1| {}.", usize::MAX)
        );
    }

    #[test]
    fn rejection_notice_names_feedback() {
        let evaluation = Evaluation {
            observations: "editing the wrong file".to_string(),
            right_track: false,
            feedback: Some("look at utils.py".to_string()),
        };
        let notice = evaluation.rejection_notice();
        assert!(notice.contains("not on the right track"));
        assert!(notice.contains("editing the wrong file"));
        assert!(notice.contains("look at utils.py"));
    }

    #[test]
    fn diff_evaluation_rejects_out_of_range_score() {
        let eval = DiffEvaluation {
            observations: String::new(),
            score: 11,
            pass_tests: false,
            correct: false,
        };
        assert!(eval.validate().is_err());
    }
}
