//! The step-bounded agent loop.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::agents::{ACTION_SCHEMA, ActionEvaluator, Decider};
use crate::core::loop_state::LoopState;
use crate::core::trajectory::Trajectory;
use crate::core::types::{Action, Evaluation};
use crate::dispatch::{Toolbox, dispatch};
use crate::io::step_log::{StepMeta, StepWriteRequest, write_step, write_trajectory};

/// What the agent is asked to fix.
#[derive(Debug, Clone, Copy)]
pub struct Task<'a> {
    pub problem: &'a str,
    pub hints: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_steps: u32,
    /// Where step artifacts go; `None` disables them.
    pub state_dir: Option<PathBuf>,
}

/// Why `run_agent` stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum LoopStop {
    /// The oracle submitted at this 0-based step.
    Submitted { step: u32 },
    /// The budget ran out without a submission.
    Exhausted { max_steps: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    pub steps_executed: u32,
    pub stop: LoopStop,
}

impl LoopOutcome {
    pub fn submitted(&self) -> bool {
        matches!(self.stop, LoopStop::Submitted { .. })
    }
}

/// One executed step, handed to the `on_step` callback.
#[derive(Debug, Clone)]
pub struct StepReport<'a> {
    pub step: u32,
    pub action: &'a Action,
    pub evaluation: Option<&'a Evaluation>,
    /// The evaluator rejected the action, so it was not executed.
    pub gated: bool,
    pub observation: &'a str,
}

/// Drive the oracle until it submits or `max_steps` steps have run.
///
/// Every step appends exactly one trajectory entry, gated steps included.
/// Oracle failures (including contract violations) end the run with an error;
/// everything the collaborators report comes back as observation text.
#[instrument(skip_all, fields(max_steps = config.max_steps, gated = evaluator.is_some()))]
pub fn run_agent<F: FnMut(&StepReport<'_>)>(
    task: Task<'_>,
    decider: &dyn Decider,
    evaluator: Option<&dyn ActionEvaluator>,
    toolbox: &Toolbox<'_>,
    config: &LoopConfig,
    trajectory: &mut Trajectory,
    mut on_step: F,
) -> Result<LoopOutcome> {
    let mut state = LoopState::start(config.max_steps);
    let mut steps_executed = 0u32;

    while let LoopState::Running(step) = state {
        let started = Instant::now();
        let action = decider
            .decide(trajectory, task.problem, task.hints)
            .with_context(|| format!("decide step {step}"))?;
        debug!(step, action = %action.kind, "decided");

        if let Some(learning) = &action.learning {
            trajectory.learn(learning.clone());
        }

        let evaluation = match evaluator {
            Some(evaluator) => Some(
                evaluator
                    .evaluate(trajectory, &action, ACTION_SCHEMA, task.problem)
                    .with_context(|| format!("evaluate step {step}"))?,
            ),
            None => None,
        };
        let gated = evaluation.as_ref().is_some_and(|e| !e.right_track);
        let observation = match &evaluation {
            Some(evaluation) if gated => {
                info!(step, "evaluator rejected action");
                evaluation.rejection_notice()
            }
            _ => dispatch(&action, toolbox),
        };

        if let Some(state_dir) = &config.state_dir {
            let meta = StepMeta {
                step,
                action: action.name(),
                gated,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            write_step(&StepWriteRequest {
                state_dir,
                meta: &meta,
                action: &action,
                evaluation: evaluation.as_ref(),
                observation: &observation,
            })?;
        }

        on_step(&StepReport {
            step,
            action: &action,
            evaluation: evaluation.as_ref(),
            gated,
            observation: &observation,
        });

        let submitted = action.kind.is_submit();
        trajectory.record(action, observation);
        steps_executed += 1;
        state = state.advance(submitted, config.max_steps);
    }

    if let Some(state_dir) = &config.state_dir {
        write_trajectory(state_dir, trajectory)?;
    }

    let stop = match state {
        LoopState::Submitted => LoopStop::Submitted {
            step: steps_executed.saturating_sub(1),
        },
        _ => {
            info!("Failed to solve the problem in the given steps.");
            LoopStop::Exhausted {
                max_steps: config.max_steps,
            }
        }
    };
    info!(steps_executed, ?stop, "agent loop finished");
    Ok(LoopOutcome {
        steps_executed,
        stop,
    })
}
