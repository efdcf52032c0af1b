//! Filesystem access rooted at one working copy.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

/// A working copy owned by exactly one run.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    /// Directories inside the root that search never walks into.
    excluded: Vec<PathBuf>,
}

impl Workspace {
    /// Relative roots are made absolute against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            excluded: Vec::new(),
        }
    }

    /// Hide `dir` (typically the agent's own state directory) from search.
    pub fn excluding(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.excluded.push(std::path::absolute(&dir).unwrap_or(dir));
        self
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| path.starts_with(dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a workspace-relative path, refusing anything that would land outside the root.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel.trim());
        if rel_path.as_os_str().is_empty() {
            bail!("empty path");
        }
        let mut normalized = PathBuf::new();
        for component in rel_path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => normalized.push(part),
                Component::ParentDir => {
                    if !normalized.pop() {
                        bail!("path escapes the workspace: {rel}");
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    // Absolute paths are accepted only when they already point inside the root.
                    let stripped = rel_path
                        .strip_prefix(&self.root)
                        .map_err(|_| anyhow!("path escapes the workspace: {rel}"))?;
                    return self.resolve(&stripped.to_string_lossy());
                }
            }
        }
        Ok(self.root.join(normalized))
    }

    /// Path relative to the root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn exists(&self, rel: &str) -> Result<bool> {
        Ok(self.resolve(rel)?.is_file())
    }

    pub fn read_bytes(&self, rel: &str) -> Result<Vec<u8>> {
        let path = self.resolve(rel)?;
        fs::read(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> Result<()> {
        let path = self.resolve(rel)?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }
}
