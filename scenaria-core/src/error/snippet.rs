use colored::Colorize;

use super::locate::locate;

const LINES_BEFORE: usize = 3;
const LINES_AFTER: usize = 2;

/// Renders the lines of `source` around the node at `path`, marking the failing line.
///
/// Returns `None` when the path can't be found in the document.
pub fn render_snippet(source: &str, path: &str, colored: bool) -> Option<String> {
    render_snippet_at(source, path, 0, colored)
}

/// Like [`render_snippet`] for a document that starts `line_offset` lines into its file.
pub fn render_snippet_at(
    source: &str,
    path: &str,
    line_offset: usize,
    colored: bool,
) -> Option<String> {
    let (line, col) = locate(source, path)?;
    let lines: Vec<&str> = source.lines().collect();
    let first = line.saturating_sub(LINES_BEFORE);
    let last = (line + LINES_AFTER).min(lines.len().saturating_sub(1));
    let width = (last + 1 + line_offset).to_string().len();

    let mut out = String::new();
    for (i, text) in lines.iter().enumerate().take(last + 1).skip(first) {
        let marker = if i == line { ">" } else { " " };
        let row = format!("{marker} {:>width$} | {text}", i + 1 + line_offset);
        if i == line && colored {
            out.push_str(&row.red().to_string());
        } else {
            out.push_str(&row);
        }
        out.push('\n');
        if i == line {
            let span = text[col.min(text.len())..]
                .split(':')
                .next()
                .map(|s| s.trim_end().chars().count())
                .unwrap_or(1)
                .max(1);
            let caret = format!("  {:>width$} | {}{}", "", " ".repeat(col), "^".repeat(span));
            if colored {
                out.push_str(&caret.red().to_string());
            } else {
                out.push_str(&caret);
            }
            out.push('\n');
        }
    }
    Some(out)
}
