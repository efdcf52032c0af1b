//! Outline and numbered-slice rendering for file views.

/// `Total Lines: N` header followed by every definition line as `<n>: <trimmed>`.
pub fn render_outline(lines: &[&str], prefixes: &[String]) -> String {
    let entries: Vec<String> = lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim();
            prefixes
                .iter()
                .any(|prefix| trimmed.starts_with(prefix.as_str()))
                .then(|| format!("{}: {}", idx + 1, trimmed))
        })
        .collect();
    format!(
        "Total Lines: {}\n\n# Outline:\n\n{}",
        lines.len(),
        entries.join("\n")
    )
}

/// Lines `[start, end)` rendered as `<1-based number>| <line>`.
pub fn render_slice(lines: &[&str], start: usize, end: usize) -> String {
    let end = end.min(lines.len());
    let start = start.min(end);
    let mut out = String::new();
    for (offset, line) in lines[start..end].iter().enumerate() {
        out.push_str(&format!("{}| {}", start + offset + 1, line));
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}
