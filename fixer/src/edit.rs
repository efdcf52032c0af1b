//! Edit pipeline: turn a proposed replacement into a validated file mutation.
//!
//! For one [`Edit`]:
//! 1. read the file and check the requested range against it;
//! 2. check that `code_to_replace` spans the requested number of lines;
//! 3. hand the target lines plus a guard margin to the [`Rewriter`];
//! 4. splice the rewritten window back and write the whole file;
//! 5. run the [`StaticChecker`]; on failure restore the file and report.
//!
//! Nothing is written before step 4, so failures up to there need no rollback.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::agents::Rewriter;
use crate::core::types::{Edit, Edits};
use crate::core::window::{
    Window, check_range, check_replace_line_count, splice, split_lines, window_text,
};
use crate::io::config::{EditConfig, RollbackMode};
use crate::io::git::VersionControl;
use crate::io::lint::StaticChecker;
use crate::io::workspace::Workspace;

pub const EDITS_APPLIED: &str = "Edits applied successfully";

/// Collaborators one workspace's edits go through.
pub struct EditPipeline<'a> {
    pub workspace: &'a Workspace,
    pub rewriter: &'a dyn Rewriter,
    pub checker: &'a dyn StaticChecker,
    pub vcs: &'a dyn VersionControl,
    pub config: &'a EditConfig,
}

impl EditPipeline<'_> {
    /// Apply one edit. Returns the new file content.
    ///
    /// On error the file holds exactly what it held before the call (or, with
    /// [`RollbackMode::Checkout`], its committed version).
    #[instrument(skip_all, fields(file = %edit.file_path, start = edit.start_line, end = edit.end_line))]
    pub fn apply_edit(&self, edit: &Edit) -> Result<String> {
        let path = self
            .workspace
            .resolve(&edit.file_path)
            .map_err(|err| anyhow!("Error: invalid file path - {}: {err}", edit.file_path))?;
        if !self.workspace.exists(&edit.file_path)? {
            bail!("Error: File does not exist - {}", edit.file_path);
        }
        let original = self.workspace.read_bytes(&edit.file_path)?;
        let text = String::from_utf8(original.clone())
            .map_err(|_| anyhow!("Error: {} is not valid UTF-8", edit.file_path))?;

        let lines = split_lines(&text);
        check_range(edit.start_line, edit.end_line, lines.len())?;
        check_replace_line_count(&edit.code_to_replace, edit.start_line, edit.end_line)?;

        let window = Window::around(
            edit.start_line,
            edit.end_line,
            self.config.guard_margin,
            lines.len(),
        );
        let snippet = window_text(&lines, window);
        let rewritten = self
            .rewriter
            .rewrite(&snippet, &edit.code_to_replace, &edit.new_code)
            .context("rewrite failed")?;
        debug!(
            window_start = window.start,
            window_end = window.end,
            rewritten_lines = rewritten.lines().count(),
            "rewrote window"
        );

        let updated = splice(&lines, window, &rewritten);
        self.workspace.write(&edit.file_path, &updated)?;

        let failure = match self.checker.check(&path) {
            Ok(report) if report.passed => None,
            Ok(report) => Some(anyhow!(
                "Error linting file.: \n{}\n\nMake sure to use existing variables and functions in the code.",
                report.diagnostics.trim()
            )),
            Err(err) => Some(err.context("static check could not run")),
        };
        if let Some(err) = failure {
            warn!("edit failed validation, rolling back");
            if let Err(rollback_err) = self.rollback(&edit.file_path, &original) {
                return Err(err.context(format!("rollback failed: {rollback_err:#}")));
            }
            return Err(err);
        }

        info!("edit applied");
        Ok(updated)
    }

    /// Apply a batch in order, stopping at the first failure.
    ///
    /// Edits before the failing one stay applied; there is no cross-file
    /// transaction. Callers that need all-or-nothing must snapshot the
    /// workspace themselves.
    pub fn apply_edits(&self, edits: &Edits) -> String {
        for edit in &edits.edits {
            if let Err(err) = self.apply_edit(edit) {
                return format!("Error applying edits to file {}: {err:#}", edit.file_path);
            }
        }
        EDITS_APPLIED.to_string()
    }

    fn rollback(&self, rel: &str, original: &[u8]) -> Result<()> {
        match self.config.rollback {
            RollbackMode::Snapshot => self
                .workspace
                .write(rel, original)
                .with_context(|| format!("restore {rel}")),
            RollbackMode::Checkout => self.vcs.checkout_path(rel),
        }
    }
}
