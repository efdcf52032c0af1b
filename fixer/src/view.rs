//! Line-numbered, outline-annotated file views.

use tracing::{debug, instrument};

use crate::core::outline::{render_outline, render_slice};
use crate::core::types::ViewFile;
use crate::core::window::split_lines;
use crate::io::config::ViewConfig;
use crate::io::workspace::Workspace;

/// Render `<path>:\n\n<outline>\n\n# File content:\n<numbered slice>`.
///
/// Margins below `config.min_margin` are raised to it. Read-only.
#[instrument(skip_all, fields(file = %request.file_path, cursor = request.cursor_line))]
pub fn view_file(workspace: &Workspace, request: &ViewFile, config: &ViewConfig) -> String {
    let not_found = || format!("File not found: {}", request.file_path);
    match workspace.exists(&request.file_path) {
        Ok(true) => {}
        Ok(false) => return not_found(),
        Err(err) => {
            debug!(err = %err, "rejected view path");
            return not_found();
        }
    }
    let bytes = match workspace.read_bytes(&request.file_path) {
        Ok(bytes) => bytes,
        Err(err) => return format!("Error reading file {}: {err:#}", request.file_path),
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines = split_lines(&text);
    let total = lines.len();

    if request.cursor_line > total {
        return format!(
            "Incorrect line number: {}. The file has only {total} lines.",
            request.cursor_line
        );
    }

    let before = request.before.max(config.min_margin);
    let after = request.after.max(config.min_margin);
    let start = request.cursor_line.saturating_sub(before);
    let end = request.cursor_line.saturating_add(after).min(total);

    let outline = render_outline(&lines, &config.outline_prefixes);
    let contents = render_slice(&lines, start, end);
    format!(
        "{}:\n\n{outline}\n\n# File content:\n{contents}",
        request.file_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;

    fn request(path: &str, cursor: usize, before: usize, after: usize) -> ViewFile {
        ViewFile {
            file_path: path.to_string(),
            cursor_line: cursor,
            before,
            after,
        }
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("x{i} = {i}\n")).collect()
    }

    #[test]
    fn renders_header_outline_and_slice() {
        let ws = TestWorkspace::with_files(&[("m.py", "class A:\n    def f(self):\n        return 1\n")])
            .expect("workspace");
        let out = view_file(&ws.workspace(), &request("m.py", 1, 100, 100), &ViewConfig::default());
        assert_eq!(
            out,
            "m.py:\n\nTotal Lines: 3\n\n# Outline:\n\n1: class A:\n2: def f(self):\n\n# File content:\n1| class A:\n2|     def f(self):\n3|         return 1\n"
        );
    }

    #[test]
    fn slice_spans_cursor_margins() {
        let ws = TestWorkspace::with_files(&[("big.py", numbered(500).as_str())]).expect("workspace");
        let out = view_file(&ws.workspace(), &request("big.py", 250, 100, 100), &ViewConfig::default());
        assert!(out.contains("\n151| x151 = 151\n"), "first shown line");
        assert!(!out.contains("\n150| "), "line before the window");
        assert!(out.contains("\n350| x350 = 350\n"), "last shown line");
        assert!(!out.contains("\n351| "), "line after the window");
    }

    #[test]
    fn small_margins_are_raised_to_minimum() {
        let ws = TestWorkspace::with_files(&[("big.py", numbered(500).as_str())]).expect("workspace");
        let out = view_file(&ws.workspace(), &request("big.py", 250, 1, 1), &ViewConfig::default());
        assert!(out.contains("\n151| "));
        assert!(out.contains("\n350| "));
    }

    #[test]
    fn cursor_past_end_names_both_numbers() {
        let ws = TestWorkspace::with_files(&[("a.py", numbered(10).as_str())]).expect("workspace");
        let out = view_file(&ws.workspace(), &request("a.py", 50, 100, 100), &ViewConfig::default());
        assert_eq!(out, "Incorrect line number: 50. The file has only 10 lines.");
    }

    #[test]
    fn missing_file_is_reported() {
        let ws = TestWorkspace::with_files(&[]).expect("workspace");
        let out = view_file(&ws.workspace(), &request("nope.py", 1, 100, 100), &ViewConfig::default());
        assert_eq!(out, "File not found: nope.py");
    }

    #[test]
    fn escaping_path_reads_as_missing() {
        let ws = TestWorkspace::with_files(&[]).expect("workspace");
        let out = view_file(&ws.workspace(), &request("../etc/passwd", 1, 100, 100), &ViewConfig::default());
        assert_eq!(out, "File not found: ../etc/passwd");
    }
}
