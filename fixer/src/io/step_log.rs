//! Step logging under `<state_dir>/steps/`.
//!
//! These are product artifacts: always written, independent of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::trajectory::Trajectory;
use crate::core::types::{Action, ActionName, Evaluation};

#[derive(Debug, Clone, Serialize)]
pub struct StepMeta {
    pub step: u32,
    pub action: ActionName,
    /// True when the evaluator rejected the action and it was not executed.
    pub gated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StepPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub action_path: PathBuf,
    pub evaluation_path: PathBuf,
    pub observation_path: PathBuf,
}

impl StepPaths {
    pub fn new(state_dir: &Path, step: u32) -> Self {
        let dir = state_dir.join("steps").join(step.to_string());
        Self {
            meta_path: dir.join("meta.json"),
            action_path: dir.join("action.json"),
            evaluation_path: dir.join("evaluation.json"),
            observation_path: dir.join("observation.txt"),
            dir,
        }
    }
}

pub struct StepWriteRequest<'a> {
    pub state_dir: &'a Path,
    pub meta: &'a StepMeta,
    pub action: &'a Action,
    pub evaluation: Option<&'a Evaluation>,
    pub observation: &'a str,
}

pub fn write_step(request: &StepWriteRequest<'_>) -> Result<StepPaths> {
    let paths = StepPaths::new(request.state_dir, request.meta.step);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create step dir {}", paths.dir.display()))?;

    write_json(&paths.action_path, request.action)?;
    if let Some(evaluation) = request.evaluation {
        write_json(&paths.evaluation_path, evaluation)?;
    }
    write_text(&paths.observation_path, request.observation)?;
    write_json(&paths.meta_path, request.meta)?;

    Ok(paths)
}

pub fn trajectory_path(state_dir: &Path) -> PathBuf {
    state_dir.join("trajectory.json")
}

pub fn write_trajectory(state_dir: &Path, trajectory: &Trajectory) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("create state dir {}", state_dir.display()))?;
    let path = trajectory_path(state_dir);
    write_json(&path, trajectory)?;
    Ok(path)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_text(path, &buf)
}
