//! Oracle roles.
//!
//! Each role is a typed contract. The loop, the edit pipeline and the harness
//! depend only on these traits; [`exec_oracle::ExecOracle`] implements all of
//! them over an [`crate::io::executor::Executor`].

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::trajectory::Trajectory;
use crate::core::types::{Action, DiffEvaluation, Evaluation, MetaEvaluation};

pub mod exec_oracle;

/// JSON Schema of the action union, shown to the evaluator as the set of possible actions.
pub const ACTION_SCHEMA: &str = include_str!("../../schemas/action.schema.json");
pub(crate) const EVALUATION_SCHEMA: &str = include_str!("../../schemas/evaluation.schema.json");
pub(crate) const REWRITE_SCHEMA: &str = include_str!("../../schemas/rewrite.schema.json");
pub(crate) const GRADE_SCHEMA: &str = include_str!("../../schemas/grade.schema.json");
pub(crate) const META_EVALUATION_SCHEMA: &str =
    include_str!("../../schemas/meta_evaluation.schema.json");

/// Picks the next action.
pub trait Decider {
    fn decide(&self, trajectory: &Trajectory, problem: &str, hints: Option<&str>) -> Result<Action>;
}

/// Judges a pending action before it runs.
pub trait ActionEvaluator {
    fn evaluate(
        &self,
        trajectory: &Trajectory,
        pending: &Action,
        possible_actions: &str,
        problem: &str,
    ) -> Result<Evaluation>;
}

/// Turns (window, old text, new text) into the full replacement for the window.
pub trait Rewriter {
    fn rewrite(&self, window: &str, to_replace: &str, new_code: &str) -> Result<String>;
}

/// Grades a produced diff against the reference fix.
pub trait FixGrader {
    fn grade(
        &self,
        problem: &str,
        diff: &str,
        reference_diff: &str,
        test_patch: &str,
    ) -> Result<DiffEvaluation>;
}

/// Reviews a finished trajectory against the reference fix.
pub trait MetaEvaluator {
    fn meta_evaluate(
        &self,
        trajectory: &Trajectory,
        problem: &str,
        reference_diff: &str,
    ) -> Result<MetaEvaluation>;
}

pub(crate) fn write_output_schema(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create schema dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write schema {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::executor::validate_against_schema;
    use serde_json::{Value, json};

    fn schema(raw: &str) -> Value {
        serde_json::from_str(raw).expect("schema json")
    }

    #[test]
    fn action_schema_accepts_every_variant() {
        let action = schema(ACTION_SCHEMA);
        let edit = json!({
            "file_path": "a.py",
            "short_description": "fix",
            "code_to_replace": "x\n",
            "start_line": 1,
            "end_line": 1,
            "new_code": "y\n",
            "seen_all_needed_code": true,
            "no_other_file_viewing_needed": true,
            "edit_contains_all_needed_code": true,
            "no_unknowns": true
        });
        for (name, input) in [
            ("search", json!({"regex": "def x"})),
            (
                "view_file",
                json!({"file_path": "a.py", "cursor_line": 1, "before": 100, "after": 100}),
            ),
            ("edits", json!({"edits": [edit]})),
            ("submit", json!({"done": true})),
        ] {
            let value = json!({
                "thoughts": "t",
                "learning": null,
                "action_name": name,
                "action_input": input
            });
            validate_against_schema(&action, &value).expect(name);
        }
    }

    #[test]
    fn action_schema_rejects_unknown_tag() {
        let value = json!({
            "thoughts": "t",
            "learning": null,
            "action_name": "create_file",
            "action_input": {"done": true}
        });
        assert!(validate_against_schema(&schema(ACTION_SCHEMA), &value).is_err());
    }

    #[test]
    fn grade_schema_bounds_score() {
        let grade = schema(GRADE_SCHEMA);
        let ok = json!({"observations": "", "score": 10, "pass_tests": true, "correct": true});
        let too_high = json!({"observations": "", "score": 11, "pass_tests": true, "correct": true});
        assert!(validate_against_schema(&grade, &ok).is_ok());
        assert!(validate_against_schema(&grade, &too_high).is_err());
    }

    #[test]
    fn remaining_schemas_parse() {
        for raw in [EVALUATION_SCHEMA, REWRITE_SCHEMA, META_EVALUATION_SCHEMA] {
            schema(raw);
        }
    }
}
