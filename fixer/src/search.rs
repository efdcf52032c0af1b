//! Regex search over file contents and file names.
//!
//! Best effort: files that cannot be read, and directory entries the walk cannot
//! stat, are skipped without failing the search.

use std::fs;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::io::config::SearchConfig;
use crate::io::workspace::Workspace;

/// Combined content and file-name search, rendered as one observation.
#[instrument(skip_all, fields(regex))]
pub fn search(workspace: &Workspace, regex: &str, config: &SearchConfig) -> String {
    match search_blocks(workspace, regex, config) {
        Ok((content, names)) => format!(
            "First {} files containing {regex}:\n\n{content}\n\nFirst {} filenames matching {regex}:\n\n{names}",
            config.max_content_matches, config.max_file_matches
        ),
        Err(err) => format!("Error searching for regex: {regex}. Error: {err}"),
    }
}

fn search_blocks(workspace: &Workspace, regex: &str, config: &SearchConfig) -> Result<(String, String)> {
    let compiled = Regex::new(regex)?;
    let content = search_contents(workspace, &compiled, config);
    let names = search_file_names(workspace, &compiled, config);
    Ok((content, names))
}

/// Matching lines as `- <path> line <n> : <trimmed line>`, hidden directories excluded.
pub fn search_contents(workspace: &Workspace, regex: &Regex, config: &SearchConfig) -> String {
    let mut matches = Vec::new();
    let walker = WalkDir::new(workspace.root())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden_dir(entry) && !workspace.is_excluded(entry.path()));
    'files: for entry in walker.filter_map(skip_walk_error) {
        if !entry.file_type().is_file() {
            continue;
        }
        let bytes = match fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %entry.path().display(), err = %err, "skipping unreadable file");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let rel = workspace.relative(entry.path());
        for (idx, line) in text.lines().enumerate() {
            if !regex.is_match(line) {
                continue;
            }
            let shown: String = line.trim().chars().take(config.max_line_chars).collect();
            matches.push(format!("- {rel} line {} : {shown}", idx + 1));
            if matches.len() >= config.max_content_matches {
                break 'files;
            }
        }
    }
    if matches.is_empty() {
        return format!("No files containing '{}' found.", regex.as_str());
    }
    matches.join("\n")
}

/// Files whose name (not path) matches, as `- <path>`. Hidden directories are
/// walked; excluded ones are not.
pub fn search_file_names(workspace: &Workspace, regex: &Regex, config: &SearchConfig) -> String {
    let files: Vec<String> = WalkDir::new(workspace.root())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !workspace.is_excluded(entry.path()))
        .filter_map(skip_walk_error)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| regex.is_match(&entry.file_name().to_string_lossy()))
        .take(config.max_file_matches)
        .map(|entry| format!("- {}", workspace.relative(entry.path())))
        .collect();
    if files.is_empty() {
        return format!("No file names containing {} found.", regex.as_str());
    }
    files.join("\n")
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

fn skip_walk_error(entry: walkdir::Result<DirEntry>) -> Option<DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            debug!(err = %err, "skipping unwalkable entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn finds_content_and_names() {
        let ws = TestWorkspace::with_files(&[
            ("pkg/parser.py", "import os\n    def parse(text):  \n"),
            ("pkg/util.py", "def helper():\n    parse(1)\n"),
        ])
        .expect("workspace");
        let out = search(&ws.workspace(), "parse", &config());
        assert!(out.starts_with("First 100 files containing parse:\n\n"), "{out}");
        assert!(out.contains("- pkg/parser.py line 2 : def parse(text):\n"), "{out}");
        assert!(out.contains("- pkg/util.py line 2 : parse(1)"), "{out}");
        assert!(out.contains("First 100 filenames matching parse:\n\n- pkg/parser.py"), "{out}");
    }

    #[test]
    fn zero_matches_are_explicit() {
        let ws = TestWorkspace::with_files(&[("a.py", "x = 1\n")]).expect("workspace");
        let out = search(&ws.workspace(), "nothing_here", &config());
        assert!(out.contains("No files containing 'nothing_here' found."), "{out}");
        assert!(out.contains("No file names containing nothing_here found."), "{out}");
    }

    #[test]
    fn hidden_directories_are_skipped_for_contents_only() {
        let ws = TestWorkspace::with_files(&[
            (".git/config_needle", "needle\n"),
            ("src/a.py", "no match\n"),
        ])
        .expect("workspace");
        let out = search(&ws.workspace(), "needle", &config());
        assert!(out.contains("No files containing 'needle' found."), "{out}");
        assert!(out.contains("- .git/config_needle"), "{out}");
    }

    /// Verifies the agent's own state directory never shows up in results.
    #[test]
    fn excluded_state_dir_is_not_listed() {
        let ws = TestWorkspace::with_files(&[
            (".fixer/calls/0000-decide/prompt.md", "find prompt\n"),
            ("docs/prompt.md", "find prompt\n"),
        ])
        .expect("workspace");
        let workspace = ws.workspace().excluding(ws.root().join(".fixer"));
        let out = search(&workspace, "prompt", &config());
        assert!(out.contains("- docs/prompt.md"), "{out}");
        assert!(!out.contains(".fixer"), "{out}");
    }

    #[test]
    fn invalid_regex_is_reported() {
        let ws = TestWorkspace::with_files(&[("a.py", "x\n")]).expect("workspace");
        let out = search(&ws.workspace(), "(unclosed", &config());
        assert!(out.starts_with("Error searching for regex: (unclosed. Error: "), "{out}");
    }

    #[test]
    fn content_matches_are_capped_and_truncated() {
        let long_line = format!("hit {}\n", "z".repeat(300));
        let body = long_line.repeat(150);
        let ws = TestWorkspace::with_files(&[("big.txt", body.as_str())]).expect("workspace");
        let content = search_contents(
            &ws.workspace(),
            &Regex::new("hit").expect("regex"),
            &config(),
        );
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 100);
        let shown = lines[0].split(" : ").nth(1).expect("shown");
        assert_eq!(shown.chars().count(), 120);
    }

    #[test]
    fn invalid_utf8_does_not_fail_search() {
        let ws = TestWorkspace::with_files(&[("ok.py", "target\n")]).expect("workspace");
        std::fs::write(ws.root().join("bin.dat"), [0xff, 0xfe, b't', b'a', b'r', b'g', b'e', b't'])
            .expect("write");
        let out = search_contents(
            &ws.workspace(),
            &Regex::new("target").expect("regex"),
            &config(),
        );
        assert!(out.contains("- ok.py line 1 : target"), "{out}");
        assert!(out.contains("- bin.dat line 1"), "{out}");
    }
}
