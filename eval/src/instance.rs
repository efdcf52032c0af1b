//! Dataset instance loading and validation.
//!
//! A dataset split is a JSON Lines file at
//! `<root>/datasets/<dataset_name>/<split>.jsonl`, one instance per line.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// One bug to fix: a repository at a commit plus the issue text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    /// `owner/name` on the code host.
    pub repo: String,
    pub base_commit: String,
    pub problem_statement: String,
    #[serde(default)]
    pub hints_text: String,
    pub instance_id: String,
    /// Reference fix written by a human.
    #[serde(default)]
    pub patch: String,
    /// Tests added alongside the reference fix.
    #[serde(default)]
    pub test_patch: String,
}

impl Instance {
    /// Hints for the agent, or `None` when blank.
    pub fn hints(&self) -> Option<&str> {
        let hints = self.hints_text.trim();
        (!hints.is_empty()).then_some(self.hints_text.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.instance_id.trim().is_empty() {
            bail!("instance_id must be non-empty");
        }
        let mut parts = self.repo.split('/');
        let valid_repo = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None)
                if !owner.is_empty() && !name.is_empty() && owner != ".." && name != ".."
        );
        if !valid_repo {
            bail!("repo must look like owner/name, got {:?}", self.repo);
        }
        if self.base_commit.trim().is_empty() {
            bail!("base_commit must be non-empty");
        }
        if self.problem_statement.trim().is_empty() {
            bail!("problem_statement must be non-empty");
        }
        Ok(())
    }
}

pub fn dataset_path(root: &Path, dataset_name: &str, split: &str) -> PathBuf {
    root.join("datasets")
        .join(dataset_name)
        .join(format!("{split}.jsonl"))
}

/// Load and validate every instance in a split file.
pub fn load_instances(path: &Path) -> Result<Vec<Instance>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read dataset {}", path.display()))?;
    let instances = parse_instances(&contents)
        .with_context(|| format!("parse dataset {}", path.display()))?;
    Ok(instances)
}

fn parse_instances(contents: &str) -> Result<Vec<Instance>> {
    let mut instances = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let instance: Instance =
            serde_json::from_str(line).with_context(|| format!("line {}", idx + 1))?;
        instance
            .validate()
            .with_context(|| format!("line {} invalid", idx + 1))?;
        if !seen.insert(instance.instance_id.clone()) {
            bail!("duplicate instance_id {}", instance.instance_id);
        }
        instances.push(instance);
    }
    Ok(instances)
}

/// Pick instances by position; an empty selection keeps all of them.
pub fn select(instances: Vec<Instance>, indices: &[usize]) -> Result<Vec<Instance>> {
    if indices.is_empty() {
        return Ok(instances);
    }
    let total = instances.len();
    if let Some(bad) = indices.iter().find(|&&idx| idx >= total) {
        bail!("index {bad} out of range for {total} instances");
    }
    Ok(indices.iter().map(|&idx| instances[idx].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn line(id: &str, repo: &str) -> String {
        serde_json::json!({
            "repo": repo,
            "base_commit": "abc123",
            "problem_statement": "it breaks",
            "hints_text": "",
            "instance_id": id,
            "patch": "diff --git a/x b/x",
            "test_patch": "",
        })
        .to_string()
    }

    #[test]
    fn loads_jsonl_skipping_blank_lines() {
        let temp = tempdir().expect("tempdir");
        let path = dataset_path(temp.path(), "lite", "dev");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let contents = format!("{}\n\n{}\n", line("a__a-1", "a/a"), line("b__b-2", "b/b"));
        fs::write(&path, contents).expect("write");

        let instances = load_instances(&path).expect("load");
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].instance_id, "b__b-2");
        assert_eq!(instances[0].hints(), None);
    }

    #[test]
    fn dataset_path_layout() {
        let path = dataset_path(Path::new("/data"), "princeton-nlp/SWE-bench_Lite", "dev");
        assert_eq!(
            path,
            PathBuf::from("/data/datasets/princeton-nlp/SWE-bench_Lite/dev.jsonl")
        );
    }

    #[test]
    fn rejects_repo_without_owner() {
        let err = parse_instances(&line("x-1", "justname")).unwrap_err();
        assert!(format!("{err:#}").contains("owner/name"), "{err:#}");
    }

    #[test]
    fn rejects_repo_escaping_entries_dir() {
        assert!(parse_instances(&line("x-1", "../etc")).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let contents = format!("{}\n{}\n", line("same", "a/a"), line("same", "b/b"));
        let err = parse_instances(&contents).unwrap_err();
        assert!(err.to_string().contains("duplicate instance_id same"));
    }

    #[test]
    fn select_by_index() {
        let instances = parse_instances(&format!("{}\n{}\n", line("a", "a/a"), line("b", "b/b")))
            .expect("parse");
        let picked = select(instances.clone(), &[1]).expect("select");
        assert_eq!(picked[0].instance_id, "b");
        assert_eq!(select(instances.clone(), &[]).expect("all").len(), 2);
        assert!(select(instances, &[2]).is_err());
    }
}
