//! Child processes with timeouts and bounded output.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Marker appended to logs when a stream was cut, empty otherwise.
    pub fn truncated_notice(&self, label: &str) -> String {
        let mut notice = String::new();
        if self.stdout_truncated > 0 {
            notice.push_str(&format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            ));
        }
        if self.stderr_truncated > 0 {
            notice.push_str(&format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            ));
        }
        notice
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is drained concurrently while the child runs; at most `output_limit_bytes`
/// per stream is kept in memory.
pub fn run_command_with_timeout(
    cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    run_command(cmd, stdin, timeout, output_limit_bytes, None)
}

/// Like [`run_command_with_timeout`], additionally copying each stdout line to
/// `tee_path` as it arrives.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes, tee = tee_path.is_some()))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
    tee_path: Option<&Path>,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let tee = match tee_path {
        Some(path) => Some(open_tee(path)?),
        None => None,
    };

    debug!("spawning child process");
    let mut child = cmd.spawn().map_err(|e| {
        error!(err = %e, "failed to spawn command");
        anyhow!(e).context("spawn command")
    })?;

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || drain_lines(stdout, output_limit_bytes, tee));
    let stderr_handle = thread::spawn(move || drain(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn open_tee(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create stream dir {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("create stream file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Keep up to `limit` bytes of `chunk` in `buf`; returns how many bytes were dropped.
fn keep_limited(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> usize {
    let keep = chunk.len().min(limit.saturating_sub(buf.len()));
    buf.extend_from_slice(&chunk[..keep]);
    chunk.len() - keep
}

fn drain<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        truncated += keep_limited(&mut buf, &chunk[..n], limit);
    }
    Ok((buf, truncated))
}

fn drain_lines<R: Read>(
    reader: R,
    limit: usize,
    mut tee: Option<BufWriter<File>>,
) -> Result<(Vec<u8>, usize)> {
    if tee.is_none() {
        return drain(reader, limit);
    }
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).context("read line")?;
        if n == 0 {
            break;
        }
        if let Some(writer) = tee.as_mut()
            && let Err(e) = writer.write_all(&line).and_then(|()| writer.flush())
        {
            warn!(err = %e, "failed to write to stream file");
        }
        truncated += keep_limited(&mut buf, &line, limit);
    }
    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; exit 3");
        let out = run_command_with_timeout(cmd, None, Duration::from_secs(5), 1024).expect("run");
        assert_eq!(out.stdout_text(), "hello\n");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.timed_out);
    }

    #[test]
    fn truncates_beyond_limit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 0123456789");
        let out = run_command_with_timeout(cmd, None, Duration::from_secs(5), 4).expect("run");
        assert_eq!(out.stdout, b"0123");
        assert_eq!(out.stdout_truncated, 6);
        assert!(out.truncated_notice("lint").contains("truncated 6 bytes"));
    }

    #[test]
    fn feeds_stdin() {
        let cmd = Command::new("cat");
        let out = run_command_with_timeout(cmd, Some(b"piped"), Duration::from_secs(5), 1024)
            .expect("run");
        assert_eq!(out.stdout_text(), "piped");
    }

    #[test]
    fn kills_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 5");
        let out = run_command_with_timeout(cmd, None, Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
    }

    #[test]
    fn tees_stdout_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tee = temp.path().join("logs/stream.jsonl");
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo one; echo two");
        let out = run_command(cmd, None, Duration::from_secs(5), 1024, Some(&tee)).expect("run");
        assert_eq!(out.stdout_text(), "one\ntwo\n");
        assert_eq!(std::fs::read_to_string(tee).expect("read"), "one\ntwo\n");
    }
}
