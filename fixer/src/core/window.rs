//! Line arithmetic for the edit pipeline.
//!
//! Lines are kept with their terminators (`split_inclusive('\n')`) so that a
//! splice reproduces untouched regions byte for byte.

use anyhow::{Result, bail};

/// Half-open 0-based line range `[start, end)` sent to the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Target lines `[start_line-1, end_line)` widened by `margin` on both sides,
    /// clamped to `[0, total)`.
    pub fn around(start_line: usize, end_line: usize, margin: usize, total: usize) -> Self {
        let start = start_line.saturating_sub(1).saturating_sub(margin).min(total);
        let end = end_line.saturating_add(margin).min(total);
        Self {
            start,
            end: end.max(start),
        }
    }
}

/// Split text into lines, keeping the `\n` on each.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Number of newline characters in `text`.
pub fn newline_count(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

/// Structural checks on a requested line range against a file with `total` lines.
pub fn check_range(start_line: usize, end_line: usize, total: usize) -> Result<()> {
    if start_line == 0 {
        bail!("Invalid line range: start_line must be at least 1, got {start_line}.");
    }
    if end_line < start_line {
        bail!(
            "Invalid line range: end_line {end_line} is before start_line {start_line}."
        );
    }
    if start_line > total {
        bail!(
            "Invalid line range: start_line {start_line} is past the end of the file ({total} lines)."
        );
    }
    Ok(())
}

/// The replaced text must span `end-start` or `end-start+1` newlines.
///
/// Both counts are accepted because the last replaced line may or may not carry
/// its terminator in `code_to_replace`.
pub fn check_replace_line_count(code_to_replace: &str, start_line: usize, end_line: usize) -> Result<()> {
    let provided = newline_count(code_to_replace);
    let span = end_line.saturating_sub(start_line);
    if provided != span && provided != span + 1 {
        bail!(
            "Code to replace does not match the number of lines to replace: the code to replace \
             you provided has {provided} lines, but you specified you wanted to replace lines \
             from {start_line} to {end_line} = {span} lines to replace. Make sure to provide all \
             lines that will be replaced."
        );
    }
    Ok(())
}

/// Text of the window lines.
pub fn window_text(lines: &[&str], window: Window) -> String {
    lines[window.start..window.end].concat()
}

/// `prefix + rewritten + suffix`.
///
/// A rewritten window that lost its final newline gets it back when more lines
/// follow, so the next line is not glued onto the last rewritten one.
pub fn splice(lines: &[&str], window: Window, rewritten: &str) -> String {
    let prefix = lines[..window.start].concat();
    let suffix = lines[window.end..].concat();
    let mut out = String::with_capacity(prefix.len() + rewritten.len() + suffix.len() + 1);
    out.push_str(&prefix);
    out.push_str(rewritten);
    if !suffix.is_empty() && !rewritten.is_empty() && !rewritten.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&suffix);
    out
}
