//! Prompt rendering for the oracle roles.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::trajectory::Trajectory;
use crate::core::types::Action;

const DECIDE_TEMPLATE: &str = include_str!("prompts/decide.md");
const EVALUATE_TEMPLATE: &str = include_str!("prompts/evaluate.md");
const REWRITE_TEMPLATE: &str = include_str!("prompts/rewrite.md");
const GRADE_TEMPLATE: &str = include_str!("prompts/grade.md");
const META_EVALUATE_TEMPLATE: &str = include_str!("prompts/meta_evaluate.md");

/// One trajectory step as seen by a template.
#[derive(Debug, Clone, Serialize)]
struct StepView {
    index: usize,
    thoughts: String,
    action_json: String,
    result: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
    observation_limit_bytes: usize,
}

impl PromptEngine {
    pub fn new(observation_limit_bytes: usize) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("decide", DECIDE_TEMPLATE),
            ("evaluate", EVALUATE_TEMPLATE),
            ("rewrite", REWRITE_TEMPLATE),
            ("grade", GRADE_TEMPLATE),
            ("meta_evaluate", META_EVALUATE_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("register {name} template"))?;
        }
        Ok(Self {
            env,
            observation_limit_bytes,
        })
    }

    pub fn render_decide(
        &self,
        trajectory: &Trajectory,
        problem: &str,
        hints: Option<&str>,
    ) -> Result<String> {
        let template = self.env.get_template("decide")?;
        let rendered = template.render(context! {
            problem => problem.trim(),
            hints => hints.map(str::trim).filter(|s| !s.is_empty()),
            learnings => trajectory.learnings(),
            steps => self.step_views(trajectory)?,
        })?;
        Ok(rendered)
    }

    pub fn render_evaluate(
        &self,
        trajectory: &Trajectory,
        pending: &Action,
        possible_actions: &str,
        problem: &str,
    ) -> Result<String> {
        let template = self.env.get_template("evaluate")?;
        let pending_action =
            serde_json::to_string_pretty(pending).context("serialize pending action")?;
        let rendered = template.render(context! {
            problem => problem.trim(),
            possible_actions => possible_actions.trim(),
            learnings => trajectory.learnings(),
            steps => self.step_views(trajectory)?,
            pending_action => pending_action,
        })?;
        Ok(rendered)
    }

    pub fn render_rewrite(&self, snippet: &str, to_replace: &str, new_code: &str) -> Result<String> {
        let template = self.env.get_template("rewrite")?;
        let rendered = template.render(context! {
            snippet => with_newline(snippet),
            to_replace => with_newline(to_replace),
            new_code => with_newline(new_code),
        })?;
        Ok(rendered)
    }

    pub fn render_grade(
        &self,
        problem: &str,
        diff: &str,
        reference_diff: &str,
        test_patch: &str,
    ) -> Result<String> {
        let template = self.env.get_template("grade")?;
        let rendered = template.render(context! {
            problem => problem.trim(),
            diff => diff.trim_end(),
            reference_diff => reference_diff.trim_end(),
            test_patch => test_patch.trim_end(),
        })?;
        Ok(rendered)
    }

    pub fn render_meta_evaluate(
        &self,
        trajectory: &Trajectory,
        problem: &str,
        reference_diff: &str,
    ) -> Result<String> {
        let template = self.env.get_template("meta_evaluate")?;
        let rendered = template.render(context! {
            problem => problem.trim(),
            reference_diff => reference_diff.trim_end(),
            learnings => trajectory.learnings(),
            steps => self.step_views(trajectory)?,
        })?;
        Ok(rendered)
    }

    fn step_views(&self, trajectory: &Trajectory) -> Result<Vec<StepView>> {
        trajectory
            .steps()
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let mut action = serde_json::to_value(&step.action).context("serialize action")?;
                // Thoughts are rendered on their own line.
                if let Some(map) = action.as_object_mut() {
                    map.remove("thoughts");
                }
                Ok(StepView {
                    index: idx + 1,
                    thoughts: step.action.thoughts.trim().to_string(),
                    action_json: action.to_string(),
                    result: clip(&step.result, self.observation_limit_bytes),
                })
            })
            .collect()
    }
}

/// Cut `text` to at most `limit` bytes on a char boundary, noting how much was dropped.
pub fn clip(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[truncated {} bytes]", &text[..cut], text.len() - cut)
}

fn with_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}
