//! Working copies for fix attempts.
//!
//! Each attempt owns `<root>/entries/<instance_id>/<attempt>/<owner>/<name>`.
//! An existing checkout is reset in place; anything unusable is erased and
//! cloned again.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fixer::io::git::{Git, VersionControl};
use tracing::{debug, instrument, warn};

use crate::instance::Instance;

pub const DEFAULT_CLONE_URL_TEMPLATE: &str = "https://github.com/{repo}.git";

pub fn entry_dir(root: &Path, instance: &Instance, attempt: u32) -> PathBuf {
    root.join("entries")
        .join(&instance.instance_id)
        .join(attempt.to_string())
        .join(&instance.repo)
}

/// Substitute `{repo}` in the template.
pub fn clone_url(template: &str, repo: &str) -> String {
    template.replace("{repo}", repo)
}

/// Bring the attempt's working copy to a clean checkout of `base_commit`.
#[instrument(skip_all, fields(instance_id = %instance.instance_id, attempt))]
pub fn materialize(
    root: &Path,
    instance: &Instance,
    attempt: u32,
    url_template: &str,
) -> Result<Git> {
    let dest = entry_dir(root, instance, attempt);
    let url = clone_url(url_template, &instance.repo);

    let git = match reset_existing(&dest) {
        Ok(Some(git)) => git,
        Ok(None) => fresh_clone(&url, &dest)?,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "reset failed; cloning again");
            fresh_clone(&url, &dest)?
        }
    };
    git.checkout_commit(&instance.base_commit)
        .with_context(|| format!("checkout {}", instance.base_commit))?;
    Ok(git)
}

/// Reset a usable checkout; `None` when there is nothing to reuse.
fn reset_existing(dest: &Path) -> Result<Option<Git>> {
    let git = Git::new(dest);
    if !git.is_repo() {
        return Ok(None);
    }
    debug!("resetting existing checkout");
    git.reset_tracked()?;
    git.clean()?;
    Ok(Some(git))
}

fn fresh_clone(url: &str, dest: &Path) -> Result<Git> {
    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("erase {}", dest.display()))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Git::clone_into(url, dest)
}
