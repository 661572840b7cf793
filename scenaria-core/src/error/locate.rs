//! Maps a dotted document path onto a line of YAML source.
//!
//! This is an indentation scanner, not a YAML parser: it understands block
//! mappings and block sequences, which covers scenario documents.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Splits `steps[0].expect.body["a.b"]` into segments. Returns `None` on malformed input.
pub fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut out = Vec::new();
    let s = path.strip_prefix('$').unwrap_or(path);
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                if let Some(quoted) = inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                    out.push(PathSegment::Key(quoted.to_string()));
                } else {
                    out.push(PathSegment::Index(inner.parse().ok()?));
                }
                i = close + 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                out.push(PathSegment::Key(chars[start..i].iter().collect()));
            }
        }
    }
    Some(out)
}

/// Returns the zero-based `(line, column)` of the node addressed by `path`.
pub fn locate(source: &str, path: &str) -> Option<(usize, usize)> {
    let segments = parse_path(path)?;
    let lines: Vec<&str> = source.lines().collect();

    let mut start = 0usize;
    let mut parent_indent: isize = -1;
    // When set, the first line of the block begins after a `- ` marker.
    let mut inline_first = false;
    let mut found = None;

    for seg in &segments {
        match seg {
            PathSegment::Key(key) => {
                let mut child_col: Option<usize> = None;
                let mut hit = None;
                for (i, line) in lines.iter().enumerate().skip(start) {
                    let Some((col, content)) = block_content(line, i == start && inline_first)
                    else {
                        continue;
                    };
                    if (col as isize) <= parent_indent && !(i == start && inline_first) {
                        break;
                    }
                    let expected = *child_col.get_or_insert(col);
                    if col != expected {
                        continue;
                    }
                    if key_matches(content, key) {
                        hit = Some((i, col));
                        break;
                    }
                }
                let (i, col) = hit?;
                found = Some((i, col));
                start = i + 1;
                parent_indent = col as isize;
                inline_first = false;
            }
            PathSegment::Index(n) => {
                let mut dash_col: Option<usize> = None;
                let mut seen = 0usize;
                let mut hit = None;
                for (i, line) in lines.iter().enumerate().skip(start) {
                    let Some((col, content)) = block_content(line, i == start && inline_first)
                    else {
                        continue;
                    };
                    let is_dash = content == "-" || content.starts_with("- ");
                    if (col as isize) < parent_indent || ((col as isize) == parent_indent && !is_dash)
                    {
                        break;
                    }
                    if !is_dash {
                        continue;
                    }
                    let expected = *dash_col.get_or_insert(col);
                    if col != expected {
                        continue;
                    }
                    if seen == *n {
                        hit = Some((i, col, content.len() > 1));
                        break;
                    }
                    seen += 1;
                }
                let (i, col, has_inline) = hit?;
                found = Some((i, col));
                parent_indent = col as isize;
                if has_inline {
                    start = i;
                    inline_first = true;
                } else {
                    start = i + 1;
                    inline_first = false;
                }
            }
        }
    }
    found
}

fn block_content(line: &str, after_dash: bool) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let indent = line.len() - trimmed.len();
    if after_dash {
        let rest = trimmed.strip_prefix('-')?.trim_start();
        let col = line.len() - rest.len();
        return Some((col, rest));
    }
    Some((indent, trimmed))
}

fn key_matches(content: &str, key: &str) -> bool {
    for candidate in [key.to_string(), format!("'{key}'"), format!("\"{key}\"")] {
        if let Some(rest) = content.strip_prefix(&candidate) {
            if rest == ":" || rest.starts_with(": ") {
                return true;
            }
        }
    }
    false
}
