use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }
}

/// A finished test and its subtests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub outcome: Outcome,
    /// Seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Report>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode report: {0}")]
    Xml(String),
}

impl Report {
    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Every log line of this test and its subtests, depth-first.
    pub fn all_logs(&self) -> Vec<String> {
        let mut out = self.logs.clone();
        for child in &self.children {
            out.extend(child.all_logs());
        }
        out
    }

    pub fn find(&self, name: &str) -> Option<&Report> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let text = serde_json::to_string_pretty(self)?;
        write_file(path, text.as_bytes())
    }

    pub fn write_junit(&self, path: &Path) -> Result<(), ReportError> {
        let mut buf = Vec::new();
        super::write_junit(self, &mut buf)?;
        write_file(path, &buf)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let io = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io)?;
    }
    std::fs::write(path, bytes).map_err(io)
}

pub(super) fn build(node: &Node) -> Report {
    let outcome = node.outcome();
    let state = node.state.lock();
    Report {
        name: node.name.clone(),
        outcome,
        duration: state.duration.as_secs_f64(),
        logs: state.logs.clone(),
        children: state.children.iter().map(|c| build(c)).collect(),
    }
}
