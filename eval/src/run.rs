//! Single-instance execution.
//!
//! Checks the prediction store, materializes the working copy, runs the agent
//! loop, extracts the patch, grades it and records the prediction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fixer::agents::exec_oracle::ExecOracle;
use fixer::agents::{ActionEvaluator, Decider, FixGrader, MetaEvaluator, Rewriter};
use fixer::core::trajectory::Trajectory;
use fixer::dispatch::Toolbox;
use fixer::edit::EditPipeline;
use fixer::io::config::FixerConfig;
use fixer::io::executor::CodexExecutor;
use fixer::io::git::{Git, VersionControl};
use fixer::io::lint::{CommandChecker, StaticChecker};
use fixer::io::workspace::Workspace;
use fixer::looping::{LoopConfig, Task, run_agent};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::instance::Instance;
use crate::judge::judge;
use crate::outcome::Outcome;
use crate::predictions::{Prediction, PredictionStore};
use crate::workspace::materialize;

/// Settings shared by every instance of a batch.
pub struct RunContext {
    pub root: PathBuf,
    pub attempt: u32,
    pub clone_url_template: String,
    pub overwrite: bool,
    pub grade: bool,
    pub config: FixerConfig,
    pub store: PredictionStore,
}

/// What happened to one instance.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstanceReport {
    pub instance_id: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_executed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceReport {
    pub fn skipped(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            outcome: Outcome::Skipped,
            steps_executed: None,
            score: None,
            error: None,
        }
    }

    pub fn failed(instance_id: &str, error: String) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            outcome: Outcome::Error,
            steps_executed: None,
            score: None,
            error: Some(error),
        }
    }
}

/// The oracle roles one run talks to.
pub struct Oracles<'a> {
    pub decider: &'a dyn Decider,
    /// `None` runs every action without gating.
    pub evaluator: Option<&'a dyn ActionEvaluator>,
    pub rewriter: &'a dyn Rewriter,
    pub grader: &'a dyn FixGrader,
    pub meta: &'a dyn MetaEvaluator,
}

/// Step logs and oracle calls of an attempt, kept beside the checkout.
pub fn state_dir(root: &Path, instance: &Instance, attempt: u32) -> PathBuf {
    root.join("entries")
        .join(&instance.instance_id)
        .join(attempt.to_string())
        .join(".fixer")
}

/// Run one instance end to end with the codex-backed oracle.
///
/// Blocking; the batch runner calls it on a worker thread.
#[instrument(skip_all, fields(instance_id = %instance.instance_id))]
pub fn run_instance(ctx: &RunContext, instance: &Instance) -> Result<InstanceReport> {
    if !ctx.overwrite && ctx.store.get(&instance.instance_id)?.is_some() {
        info!("prediction exists; skipping");
        return Ok(InstanceReport::skipped(&instance.instance_id));
    }
    info!(repo = %instance.repo, commit = %instance.base_commit, "fixing instance");

    let git = materialize(
        &ctx.root,
        instance,
        ctx.attempt,
        &ctx.clone_url_template,
    )
    .context("materialize workspace")?;

    let state_dir = state_dir(&ctx.root, instance, ctx.attempt);
    let oracle = ExecOracle::new(
        CodexExecutor::from_config(&ctx.config.oracle),
        &ctx.config.oracle,
        &state_dir,
    )?;
    let evaluator: Option<&dyn ActionEvaluator> = if ctx.config.evaluate_actions {
        Some(&oracle)
    } else {
        None
    };
    let oracles = Oracles {
        decider: &oracle,
        evaluator,
        rewriter: &oracle,
        grader: &oracle,
        meta: &oracle,
    };
    let checker = CommandChecker::from_config(&ctx.config.lint);
    fix_and_record(ctx, instance, &git, &state_dir, &oracles, &checker)
}

/// Run the agent in an already materialized checkout and store the result.
pub fn fix_and_record(
    ctx: &RunContext,
    instance: &Instance,
    git: &Git,
    state_dir: &Path,
    oracles: &Oracles<'_>,
    checker: &dyn StaticChecker,
) -> Result<InstanceReport> {
    let workspace = Workspace::new(git.workdir()).excluding(state_dir);
    let toolbox = Toolbox {
        workspace: &workspace,
        edits: EditPipeline {
            workspace: &workspace,
            rewriter: oracles.rewriter,
            checker,
            vcs: git,
            config: &ctx.config.edit,
        },
        search: &ctx.config.search,
        view: &ctx.config.view,
    };
    let loop_config = LoopConfig {
        max_steps: ctx.config.max_steps,
        state_dir: Some(state_dir.to_path_buf()),
    };
    let mut trajectory = Trajectory::new();
    let outcome = run_agent(
        Task {
            problem: &instance.problem_statement,
            hints: instance.hints(),
        },
        oracles.decider,
        oracles.evaluator,
        &toolbox,
        &loop_config,
        &mut trajectory,
        |report| debug!(step = report.step, gated = report.gated, "{}", report.action.kind),
    )?;

    let patch = if outcome.submitted() {
        git.diff().context("extract patch")?
    } else {
        String::new()
    };

    let mut prediction = Prediction::new(&instance.instance_id, patch);
    if ctx.grade {
        let judgment = judge(
            oracles.grader,
            oracles.meta,
            instance,
            &prediction.model_patch,
            &trajectory,
        )?;
        prediction.evaluation = Some(judgment.evaluation);
        prediction.meta_evaluation = Some(judgment.meta_evaluation);
    }
    ctx.store.upsert(&prediction).context("save prediction")?;

    let report = InstanceReport {
        instance_id: instance.instance_id.clone(),
        outcome: Outcome::from_stop(&outcome.stop),
        steps_executed: Some(outcome.steps_executed),
        score: prediction.evaluation.as_ref().map(|e| e.score),
        error: None,
    };
    info!(outcome = report.outcome.as_str(), "instance finished");
    Ok(report)
}
