//! Git adapter for workspaces.
//!
//! A small, explicit wrapper around `git` subprocess calls. Failures carry the
//! captured stderr verbatim so they can be surfaced as observations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Version-control operations the edit pipeline and harness depend on.
pub trait VersionControl {
    /// Restore one path to its committed content.
    fn checkout_path(&self, path: &str) -> Result<()>;
    /// Remove untracked files and directories, ignored ones included.
    fn clean(&self) -> Result<()>;
    /// Unified diff of the worktree against the index.
    fn diff(&self) -> Result<String>;
    /// Apply a unified diff to the worktree.
    fn apply(&self, patch: &str) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Clone `url` into `dest` (whose parent must exist).
    #[instrument(skip_all, fields(url, dest = %dest.display()))]
    pub fn clone_into(url: &str, dest: &Path) -> Result<Git> {
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("clone destination has no parent: {}", dest.display()))?;
        let dest_arg = dest.to_string_lossy();
        let clone = Git::new(parent);
        debug!("cloning repository");
        clone.run_checked(&["clone", url, &dest_arg])?;
        Ok(Git::new(dest))
    }

    /// True when the workdir is the top level of a git worktree.
    pub fn is_repo(&self) -> bool {
        if !self.workdir.join(".git").exists() {
            return false;
        }
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Discard changes to every tracked file.
    pub fn reset_tracked(&self) -> Result<()> {
        self.run_checked(&["checkout", "--", "."])?;
        Ok(())
    }

    #[instrument(skip_all, fields(commit))]
    pub fn checkout_commit(&self, commit: &str) -> Result<()> {
        debug!("checking out commit");
        self.run_checked(&["checkout", commit])?;
        Ok(())
    }

    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        check_status(args, &output)?;
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }

    fn run_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<Output> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            stdin.write_all(input).context("write git stdin")?;
        }
        let output = child
            .wait_with_output()
            .with_context(|| format!("wait git {}", args.join(" ")))?;
        check_status(args, &output)?;
        Ok(output)
    }
}

impl VersionControl for Git {
    #[instrument(skip_all, fields(path))]
    fn checkout_path(&self, path: &str) -> Result<()> {
        debug!("restoring path from index");
        self.run_checked(&["checkout", "--", path])?;
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        self.run_checked(&["clean", "-fdx"])?;
        Ok(())
    }

    fn diff(&self) -> Result<String> {
        self.run_capture(&["diff"])
    }

    fn apply(&self, patch: &str) -> Result<()> {
        self.run_with_stdin(&["apply", "-"], patch.as_bytes())?;
        Ok(())
    }
}

fn check_status(args: &[&str], output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()))
}
