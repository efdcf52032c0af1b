//! Fixer configuration stored in `fixer.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Fixer configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixerConfig {
    /// Step budget of one run.
    pub max_steps: u32,
    /// Ask the evaluator oracle about every action before running it.
    pub evaluate_actions: bool,
    pub oracle: OracleConfig,
    pub search: SearchConfig,
    pub view: ViewConfig,
    pub edit: EditConfig,
    pub lint: LintConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Executable spawned for every oracle call.
    pub program: String,
    /// Extra arguments placed right after `exec`.
    pub args: Vec<String>,
    pub sandbox: String,
    pub timeout_secs: u64,
    /// Truncate executor stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Observations longer than this are clipped when rendered into prompts.
    pub observation_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_content_matches: usize,
    pub max_file_matches: usize,
    pub max_line_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewConfig {
    /// Requested `before`/`after` margins are raised to at least this.
    pub min_margin: usize,
    /// Trimmed lines starting with one of these are listed in the outline.
    pub outline_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RollbackMode {
    /// Restore the exact bytes the file had before the failed edit.
    #[default]
    Snapshot,
    /// Restore the committed version through version control.
    Checkout,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EditConfig {
    /// Lines of context added on each side of the replaced range.
    pub guard_margin: usize,
    pub rollback: RollbackMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LintConfig {
    /// Linter argv; the file path is appended.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            evaluate_actions: true,
            oracle: OracleConfig::default(),
            search: SearchConfig::default(),
            view: ViewConfig::default(),
            edit: EditConfig::default(),
            lint: LintConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: "codex".to_string(),
            args: vec!["-c".to_string(), "model_reasoning_effort=medium".to_string()],
            sandbox: "read-only".to_string(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
            observation_limit_bytes: 40_000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_content_matches: 100,
            max_file_matches: 100,
            max_line_chars: 120,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_margin: 100,
            outline_prefixes: vec![
                "def ".to_string(),
                "async def ".to_string(),
                "class ".to_string(),
            ],
        }
    }
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            guard_margin: 5,
            rollback: RollbackMode::Snapshot,
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ruff".to_string(),
                "check".to_string(),
                "--select".to_string(),
                "F821".to_string(),
            ],
            timeout_secs: 60,
        }
    }
}

impl FixerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.oracle.program.trim().is_empty() {
            return Err(anyhow!("oracle.program must be non-empty"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        if self.oracle.observation_limit_bytes == 0 {
            return Err(anyhow!("oracle.observation_limit_bytes must be > 0"));
        }
        if self.search.max_content_matches == 0 || self.search.max_file_matches == 0 {
            return Err(anyhow!("search match limits must be > 0"));
        }
        if self.search.max_line_chars == 0 {
            return Err(anyhow!("search.max_line_chars must be > 0"));
        }
        if self.lint.command.is_empty() || self.lint.command[0].trim().is_empty() {
            return Err(anyhow!("lint.command must be a non-empty array"));
        }
        if self.lint.timeout_secs == 0 {
            return Err(anyhow!("lint.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `FixerConfig::default()`.
pub fn load_config(path: &Path) -> Result<FixerConfig> {
    if !path.exists() {
        let cfg = FixerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FixerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &FixerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
