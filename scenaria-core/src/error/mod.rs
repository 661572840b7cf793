use std::fmt;

use thiserror::Error;

mod locate;
mod snippet;

pub use locate::{locate, parse_path, PathSegment};
pub use snippet::{render_snippet, render_snippet_at};

/// Phase of a scenario run an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Parse,
    Render,
    Invoke,
    Assert,
    Timeout,
    Setup,
    Teardown,
}

impl ErrorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPhase::Parse => "parse",
            ErrorPhase::Render => "render",
            ErrorPhase::Invoke => "invoke",
            ErrorPhase::Assert => "assert",
            ErrorPhase::Timeout => "timeout",
            ErrorPhase::Setup => "setup",
            ErrorPhase::Teardown => "teardown",
        }
    }
}

/// A single failure located by a dotted path inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub message: String,
    pub phase: Option<ErrorPhase>,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for PathError {}

/// Sibling failures kept in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPathError {
    pub errors: Vec<PathError>,
}

impl fmt::Display for MultiPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiPathError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0}")]
    Path(PathError),
    #[error("{0}")]
    Multi(MultiPathError),
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self::at("", message)
    }

    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Path(PathError {
            path: path.into(),
            message: message.into(),
            phase: None,
        })
    }

    /// Folds a list of failures: none is `Ok`, one stays single, more become a multi-error.
    pub fn collect(errors: Vec<Error>) -> Result<(), Error> {
        let mut flat: Vec<PathError> = Vec::new();
        for e in errors {
            match e {
                Error::Path(p) => flat.push(p),
                Error::Multi(m) => flat.extend(m.errors),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(Error::Path(flat.remove(0))),
            _ => Err(Error::Multi(MultiPathError { errors: flat })),
        }
    }

    pub fn with_key(self, key: &str) -> Self {
        self.with_path_prefix(&key_segment(key))
    }

    pub fn with_index(self, index: usize) -> Self {
        self.with_path_prefix(&format!("[{index}]"))
    }

    pub fn with_path_prefix(self, prefix: &str) -> Self {
        self.map_each(|mut p| {
            p.path = join_path(prefix, &p.path);
            p
        })
    }

    /// Prepends context to every message without touching paths.
    pub fn wrap(self, context: &str) -> Self {
        self.map_each(|mut p| {
            p.message = format!("{context}: {}", p.message);
            p
        })
    }

    pub fn with_phase(self, phase: ErrorPhase) -> Self {
        self.map_each(|mut p| {
            p.phase.get_or_insert(phase);
            p
        })
    }

    pub fn phase(&self) -> Option<ErrorPhase> {
        self.errors().iter().find_map(|p| p.phase)
    }

    pub fn errors(&self) -> Vec<&PathError> {
        match self {
            Error::Path(p) => vec![p],
            Error::Multi(m) => m.errors.iter().collect(),
        }
    }

    fn map_each(self, f: impl Fn(PathError) -> PathError) -> Self {
        match self {
            Error::Path(p) => Error::Path(f(p)),
            Error::Multi(m) => Error::Multi(MultiPathError {
                errors: m.errors.into_iter().map(f).collect(),
            }),
        }
    }
}

/// Formats a mapping key as a path segment (`.key`, or `["a.b"]` when quoting is needed).
pub fn key_segment(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '$'));
    if plain {
        format!(".{key}")
    } else {
        format!("[{key:?}]")
    }
}

pub fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return prefix.to_string();
    }
    if path.starts_with('.') || path.starts_with('[') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}.{path}")
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse {path} (line {line}): {source}")]
    Document {
        path: String,
        line: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
#[error("scenario failed validation:{}", violations_text(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

fn violations_text(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("\n  {v}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
