//! Static-check collaborator run after each edit.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::config::LintConfig;
use crate::io::process::run_command_with_timeout;

const LINT_OUTPUT_LIMIT: usize = 64 * 1024;

/// Result of checking one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub passed: bool,
    pub diagnostics: String,
}

impl CheckReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: String::new(),
        }
    }

    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Undefined-reference checker for a single file.
pub trait StaticChecker {
    fn check(&self, file: &Path) -> Result<CheckReport>;
}

/// Runs an external linter (`ruff check --select F821` by default) with the file appended.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandChecker {
    pub fn from_config(config: &LintConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl StaticChecker for CommandChecker {
    #[instrument(skip_all, fields(file = %file.display()))]
    fn check(&self, file: &Path) -> Result<CheckReport> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("lint command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        // The linter runs next to the file, so it gets the bare file name.
        match (file.parent(), file.file_name()) {
            (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => {
                cmd.arg(name).current_dir(dir);
            }
            _ => {
                cmd.arg(file);
            }
        }

        let output = run_command_with_timeout(cmd, None, self.timeout, LINT_OUTPUT_LIMIT)?;
        if output.timed_out {
            warn!("linter timed out");
            return Ok(CheckReport::fail(format!(
                "Linter timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if output.status.success() {
            debug!("lint passed");
            return Ok(CheckReport::pass());
        }
        debug!(exit_code = ?output.status.code(), "lint reported diagnostics");
        Ok(CheckReport::fail(format!(
            "Linter returned error: {} {}",
            output.stderr_text().trim(),
            output.stdout_text().trim()
        )))
    }
}
