//! Fakes and scratch workspaces shared by unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::agents::{ActionEvaluator, Decider, FixGrader, MetaEvaluator, Rewriter};
use crate::core::trajectory::Trajectory;
use crate::core::types::{Action, DiffEvaluation, Evaluation, MetaEvaluation};
use crate::io::git::VersionControl;
use crate::io::lint::{CheckReport, StaticChecker};
use crate::io::workspace::Workspace;

/// Temporary working copy, removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Workspace containing the given `(relative path, contents)` files.
    pub fn with_files(files: &[(&str, &str)]) -> Result<Self> {
        let dir = tempfile::tempdir().context("tempdir")?;
        let ws = Self { dir };
        for (path, contents) in files {
            ws.write(path, contents)?;
        }
        Ok(ws)
    }

    /// Git repository with `a.py` (`x = 1\n`) committed.
    pub fn git() -> Result<Self> {
        let ws = Self::with_files(&[("a.py", "x = 1\n")])?;
        ws.git_cmd(&["init", "-q"])?;
        ws.git_cmd(&["add", "-A"])?;
        ws.git_cmd(&["commit", "-q", "-m", "init"])?;
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.dir.path())
    }

    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root().join(rel))?)
    }

    pub fn read_bytes(&self, rel: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.root().join(rel))?)
    }

    /// Run git with a fixed identity inside the workspace.
    pub fn git_cmd(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(["-c", "user.name=fixer", "-c", "user.email=fixer@example.com"])
            .args(args)
            .current_dir(self.root())
            .output()
            .context("spawn git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Returns queued actions in order; errors once the queue is empty.
pub struct ScriptedDecider {
    actions: RefCell<VecDeque<Action>>,
}

impl ScriptedDecider {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions: RefCell::new(actions.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.actions.borrow().len()
    }
}

impl Decider for ScriptedDecider {
    fn decide(&self, _: &Trajectory, _: &str, _: Option<&str>) -> Result<Action> {
        self.actions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted decider has no more actions"))
    }
}

/// Returns the same verdict for every action.
pub struct ScriptedEvaluator {
    verdict: Evaluation,
    calls: Cell<u32>,
}

impl ScriptedEvaluator {
    pub fn accepting() -> Self {
        Self {
            verdict: Evaluation {
                observations: "looks right".to_string(),
                right_track: true,
                feedback: None,
            },
            calls: Cell::new(0),
        }
    }

    pub fn rejecting(observations: &str, feedback: &str) -> Self {
        Self {
            verdict: Evaluation {
                observations: observations.to_string(),
                right_track: false,
                feedback: Some(feedback.to_string()),
            },
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl ActionEvaluator for ScriptedEvaluator {
    fn evaluate(&self, _: &Trajectory, _: &Action, _: &str, _: &str) -> Result<Evaluation> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.verdict.clone())
    }
}

/// Replaces the first literal occurrence of the old text inside the window.
pub struct PassthroughRewriter;

impl Rewriter for PassthroughRewriter {
    fn rewrite(&self, window: &str, to_replace: &str, new_code: &str) -> Result<String> {
        if !window.contains(to_replace) {
            bail!("code to replace not found in window");
        }
        Ok(window.replacen(to_replace, new_code, 1))
    }
}

/// Always fails.
pub struct FailingRewriter;

impl Rewriter for FailingRewriter {
    fn rewrite(&self, _: &str, _: &str, _: &str) -> Result<String> {
        Err(anyhow!("rewriter unavailable"))
    }
}

/// Records restores without touching the filesystem.
#[derive(Default)]
pub struct RecordingVcs {
    checkouts: RefCell<Vec<String>>,
}

impl RecordingVcs {
    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.borrow().clone()
    }
}

impl VersionControl for RecordingVcs {
    fn checkout_path(&self, path: &str) -> Result<()> {
        self.checkouts.borrow_mut().push(path.to_string());
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        Ok(())
    }

    fn diff(&self) -> Result<String> {
        Ok(String::new())
    }

    fn apply(&self, _: &str) -> Result<()> {
        Ok(())
    }
}

/// Fails any file containing the marker (`UNDEFINED` by default).
pub struct MarkerChecker {
    marker: String,
}

impl Default for MarkerChecker {
    fn default() -> Self {
        Self {
            marker: "UNDEFINED".to_string(),
        }
    }
}

impl StaticChecker for MarkerChecker {
    fn check(&self, file: &Path) -> Result<CheckReport> {
        let contents = fs::read_to_string(file)?;
        match contents.lines().position(|line| line.contains(&self.marker)) {
            Some(idx) => Ok(CheckReport::fail(format!(
                "{}:{}: F821 Undefined name `{}`",
                file.display(),
                idx + 1,
                self.marker
            ))),
            None => Ok(CheckReport::pass()),
        }
    }
}

/// Grades every diff the same way.
pub struct FixedGrader(pub DiffEvaluation);

impl FixGrader for FixedGrader {
    fn grade(&self, _: &str, _: &str, _: &str, _: &str) -> Result<DiffEvaluation> {
        Ok(self.0.clone())
    }
}

/// Reviews every trajectory the same way.
pub struct FixedMetaEvaluator(pub MetaEvaluation);

impl MetaEvaluator for FixedMetaEvaluator {
    fn meta_evaluate(&self, _: &Trajectory, _: &str, _: &str) -> Result<MetaEvaluation> {
        Ok(self.0.clone())
    }
}
