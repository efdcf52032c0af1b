//! Executor abstraction for oracle invocation.
//!
//! The [`Executor`] trait decouples the oracle roles from the actual backend
//! (currently `codex exec`). Tests use scripted executors that write
//! predetermined outputs without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::io::config::OracleConfig;
use crate::io::process::{CommandOutput, run_command};

/// Parameters for an executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the executor process.
    pub workdir: PathBuf,
    /// Prompt text fed on stdin.
    pub prompt: String,
    /// JSON Schema that constrains the output.
    pub output_schema_path: PathBuf,
    /// Where the executor must write its final JSON message.
    pub output_path: PathBuf,
    /// Executor stdout/stderr log.
    pub executor_log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    /// When set, the JSONL event stream is written here as it arrives.
    pub stream_path: Option<PathBuf>,
}

/// Abstraction over oracle execution backends.
pub trait Executor {
    /// Run the oracle with the given request. Must write output to `request.output_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Executor that spawns `codex exec` (or a compatible program).
#[derive(Debug, Clone)]
pub struct CodexExecutor {
    program: String,
    args: Vec<String>,
    sandbox: String,
}

impl CodexExecutor {
    pub fn from_config(config: &OracleConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            sandbox: config.sandbox.clone(),
        }
    }
}

impl Default for CodexExecutor {
    fn default() -> Self {
        Self::from_config(&OracleConfig::default())
    }
}

impl Executor for CodexExecutor {
    #[instrument(skip_all, fields(program = %self.program, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting oracle exec");

        if !request.output_schema_path.exists() {
            bail!(
                "missing output schema {}",
                request.output_schema_path.display()
            );
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("exec")
            .args(&self.args)
            .arg("--sandbox")
            .arg(&self.sandbox)
            // Call directories are scratch space, not repositories.
            .arg("--skip-git-repo-check");
        if request.stream_path.is_some() {
            cmd.arg("--json");
        }
        cmd.arg("--output-schema")
            .arg(&request.output_schema_path)
            .arg("--output-last-message")
            .arg(&request.output_path)
            .arg("-")
            .current_dir(&request.workdir);

        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
            request.stream_path.as_deref(),
        )
        .with_context(|| format!("run {} exec", self.program))?;

        write_executor_log(
            &request.executor_log_path,
            &output,
            request.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "oracle exec timed out");
            bail!("{} exec timed out after {:?}", self.program, request.timeout);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "oracle exec failed");
            bail!(
                "{} exec failed with status {:?}",
                self.program,
                output.status.code()
            );
        }

        debug!("oracle exec completed");
        Ok(())
    }
}

/// Execute, check the output against `schema`, and deserialize it as `T`.
///
/// Any mismatch is an oracle contract violation and is returned as an error.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn execute_and_load_json<E: Executor + ?Sized, T: DeserializeOwned>(
    executor: &E,
    request: &ExecRequest,
    schema: &Value,
) -> Result<T> {
    executor.exec(request)?;
    if !request.output_path.exists() {
        return Err(anyhow!(
            "missing executor output {}",
            request.output_path.display()
        ));
    }
    let value = read_output_json(&request.output_path)?;
    validate_against_schema(schema, &value)
        .with_context(|| format!("validate {}", request.output_path.display()))?;
    let parsed = serde_json::from_value(value)
        .with_context(|| format!("deserialize {}", request.output_path.display()))?;
    Ok(parsed)
}

/// Validate `instance` against a draft 2020-12 schema, listing every violation.
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

fn read_output_json(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read oracle output {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_executor_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create executor log dir {}", parent.display()))?;
    }
    let mut buf = format!(
        "=== stdout ===\n{}\n=== stderr ===\n{}",
        output.stdout_text(),
        output.stderr_text()
    );
    buf.push_str(&output.truncated_notice("executor"));
    if output.timed_out {
        buf.push_str("\n[executor timed out]\n");
    }
    if buf.len() > output_limit {
        let mut cut = output_limit;
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        let dropped = buf.len() - cut;
        buf.truncate(cut);
        buf.push_str(&format!("\n[truncated {dropped} bytes]\n"));
    }
    fs::write(path, buf).with_context(|| format!("write executor log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    struct FakeExecutor {
        output: Option<Value>,
    }

    impl Executor for FakeExecutor {
        fn exec(&self, request: &ExecRequest) -> Result<()> {
            if let Some(output) = &self.output {
                fs::write(&request.output_path, serde_json::to_string(output)?)?;
            }
            Ok(())
        }
    }

    fn request(dir: &Path) -> ExecRequest {
        ExecRequest {
            workdir: dir.to_path_buf(),
            prompt: "prompt".to_string(),
            output_schema_path: dir.join("schema.json"),
            output_path: dir.join("output.json"),
            executor_log_path: dir.join("executor.log"),
            timeout: Duration::from_secs(1),
            output_limit_bytes: 1000,
            stream_path: None,
        }
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["ok"],
            "properties": {"ok": {"type": "boolean"}},
            "additionalProperties": false
        })
    }

    /// Verifies a conforming output is parsed into the requested type.
    #[test]
    fn loads_schema_conforming_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeExecutor {
            output: Some(json!({"ok": true})),
        };
        let got: Verdict =
            execute_and_load_json(&fake, &request(temp.path()), &schema()).expect("load");
        assert_eq!(got, Verdict { ok: true });
    }

    /// Verifies output violating the schema is rejected with the violation listed.
    #[test]
    fn rejects_output_violating_schema() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeExecutor {
            output: Some(json!({"ok": "yes"})),
        };
        let err = execute_and_load_json::<_, Verdict>(&fake, &request(temp.path()), &schema())
            .unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"), "{err:#}");
    }

    /// Verifies a missing output file is reported.
    #[test]
    fn errors_on_missing_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeExecutor { output: None };
        let err = execute_and_load_json::<_, Verdict>(&fake, &request(temp.path()), &schema())
            .unwrap_err();
        assert!(err.to_string().contains("missing executor output"));
    }
}
