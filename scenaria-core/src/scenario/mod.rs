//! Scenario documents: model, multi-document parsing and validation.

mod model;
mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use model::{
    Bind, ConstantBackoff, ExponentialBackoff, Retry, Scenario, Step, SCHEMA_VERSION,
};
pub use validate::validate_scenario;

use crate::error::ParseError;

/// Parses a duration such as `1h2m3s` or `50ms`.
pub fn parse_duration(text: &str) -> Result<std::time::Duration, String> {
    model::duration_serde::parse(text)
}

/// Reads every scenario in a file. Documents are separated by `---`.
pub fn parse_file(path: &Path) -> Result<Vec<Scenario>, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&text, path)
}

pub fn parse_str(text: &str, filepath: impl Into<PathBuf>) -> Result<Vec<Scenario>, ParseError> {
    let filepath = filepath.into();
    let mut scenarios = Vec::new();
    for (line_offset, doc) in split_documents(text) {
        let mut scenario: Scenario = serde_yaml::from_str(doc).map_err(|e| ParseError::Document {
            path: filepath.display().to_string(),
            line: e.location().map(|l| l.line() + line_offset).unwrap_or(line_offset + 1),
            source: e,
        })?;
        scenario.filepath = filepath.clone();
        scenario.source = Arc::from(doc);
        scenario.line_offset = line_offset;
        validate_scenario(&scenario)?;
        scenarios.push(scenario);
    }
    Ok(scenarios)
}

/// Splits a YAML stream on `---` lines, skipping documents without content.
/// Yields each document with the 0-based line it starts on.
fn split_documents(text: &str) -> Vec<(usize, &str)> {
    let mut docs = Vec::new();
    let mut start = 0;
    let mut start_line = 0;
    let mut offset = 0;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed.starts_with("--- ") {
            docs.push((start_line, &text[start..offset]));
            start = offset + line.len();
            start_line = i + 1;
        }
        offset += line.len();
    }
    docs.push((start_line, &text[start..]));
    docs.into_iter().filter(|(_, d)| has_content(d)).collect()
}

fn has_content(doc: &str) -> bool {
    doc.lines().any(|l| {
        let l = l.trim();
        !l.is_empty() && !l.starts_with('#') && l != "..."
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::value::Value;

    const TWO_DOCS: &str = "\
# leading comment
---
schemaVersion: scenario/v1
title: first
vars:
  auth: xxxxx
steps:
- id: echo
  title: POST /echo
  protocol: http
  timeout: 50ms
  retry:
    constant:
      interval: 1ms
      maxRetries: 1
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
  expect:
    body:
      messages: {length <-: {greater <-: 2}}
  bind:
    vars:
      id: '{{response.body.id}}'
---
schemaVersion: scenario/v1
title: second
steps:
- include: other.yaml
";

    #[test]
    fn parses_every_document_with_offsets() {
        let scenarios = parse_str(TWO_DOCS, "s.yaml").unwrap();
        assert_eq!(scenarios.len(), 2);
        let first = &scenarios[0];
        assert_eq!(first.title, "first");
        assert_eq!(first.line_offset(), 2);
        assert_eq!(first.vars.get("auth"), Some(&Value::from("xxxxx")));

        let step = &first.steps[0];
        assert_eq!(step.timeout, Some(Duration::from_millis(50)));
        let retry = step.retry.as_ref().unwrap();
        assert_eq!(retry.max_retries(), 1);
        assert_eq!(
            retry.constant.as_ref().unwrap().interval,
            Duration::from_millis(1)
        );
        let body = step.expect.as_ref().unwrap().as_map().unwrap().get("body").unwrap();
        assert!(body.as_map().unwrap().get("messages").unwrap().as_map().unwrap().contains_key("length <-"));

        assert_eq!(scenarios[1].steps[0].include.as_deref(), Some("other.yaml"));
        assert_eq!(scenarios[1].line_offset(), 25);
    }

    #[test]
    fn snippet_uses_file_line_numbers() {
        let scenarios = parse_str(TWO_DOCS, "s.yaml").unwrap();
        let out = scenarios[0].snippet("steps[0].timeout", false).unwrap();
        assert!(out.contains("> 11 |   timeout: 50ms"), "{out}");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_str("schemaVersion: scenario/v1\nsteps:\n- protocol: http\n  requst: {}\n", "x.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("requst"), "{err}");
    }

    #[test]
    fn bad_duration_reports_document_line() {
        let err = parse_str("---\nschemaVersion: scenario/v1\nsteps:\n- timeout: soon\n", "x.yaml").unwrap_err();
        assert!(matches!(err, ParseError::Document { .. }), "{err}");
        assert!(err.to_string().starts_with("failed to parse x.yaml"), "{err}");
    }

    #[test]
    fn splits_only_on_separator_lines() {
        let docs = split_documents("a: '---'\n---\n# only a comment\n---\nb: 1\n");
        assert_eq!(docs, vec![(0, "a: '---'\n"), (4, "b: 1\n")]);
    }
}
