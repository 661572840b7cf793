use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::model::{Retry, Scenario, Step, SCHEMA_VERSION};
use crate::error::{ValidationError, Violation};
use crate::template::{left_arrow_callee, Template};
use crate::value::{Map, Value};

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("valid regex"));

struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    /// Reports templates that don't parse anywhere inside `v`.
    fn validate_templates(&mut self, path: &str, v: &Value) {
        match v {
            Value::String(s) => {
                if let Err(e) = Template::parse(s) {
                    self.push(path, e.to_string());
                }
            }
            Value::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_templates(&format!("{path}[{i}]"), item);
                }
            }
            Value::Map(m) => {
                for (k, item) in m {
                    let child = format!("{path}{}", crate::error::key_segment(k));
                    if left_arrow_callee(k).is_none() {
                        if let Err(e) = Template::parse(k) {
                            self.push(&child, e.to_string());
                        }
                    }
                    self.validate_templates(&child, item);
                }
            }
            _ => {}
        }
    }

    fn validate_vars(&mut self, path: &str, vars: &Map) {
        for (k, v) in vars {
            if !ID_RE.is_match(k) {
                self.push(format!("{path}.{k}"), "must be a valid identifier");
            }
            self.validate_templates(&format!("{path}.{k}"), v);
        }
    }

    fn validate_step(&mut self, path: &str, step: &Step, ids: &mut HashSet<String>) {
        if !step.id.is_empty() {
            if !ID_RE.is_match(&step.id) {
                self.push(format!("{path}.id"), "must match [A-Za-z_][A-Za-z0-9_-]*");
            }
            if !ids.insert(step.id.clone()) {
                self.push(format!("{path}.id"), format!("duplicate step id {:?}", step.id));
            }
        }

        self.validate_vars(&format!("{path}.vars"), &step.vars);

        match &step.include {
            Some(include) => {
                if include.trim().is_empty() {
                    self.push(format!("{path}.include"), "must not be empty");
                }
                for (field, set) in [
                    ("request", step.request.is_some()),
                    ("expect", step.expect.is_some()),
                    ("protocol", !step.protocol.is_empty()),
                ] {
                    if set {
                        self.push(format!("{path}.{field}"), "can't be combined with include");
                    }
                }
            }
            None => {
                if step.request.is_none() {
                    self.push(format!("{path}.request"), "request is required");
                }
                if step.protocol.is_empty() && step.request.is_some() {
                    self.push(format!("{path}.protocol"), "protocol is required");
                }
            }
        }

        if let Some(request) = &step.request {
            self.validate_templates(&format!("{path}.request"), request);
        }
        if let Some(expect) = &step.expect {
            self.validate_templates(&format!("{path}.expect"), expect);
        }
        if let Some(bind) = &step.bind {
            self.validate_vars(&format!("{path}.bind.vars"), &bind.vars);
        }
        if let Some(retry) = &step.retry {
            self.validate_retry(&format!("{path}.retry"), retry);
        }
        if step.timeout.is_some_and(|d| d.is_zero()) {
            self.push(format!("{path}.timeout"), "must be positive");
        }
    }

    fn validate_retry(&mut self, path: &str, retry: &Retry) {
        match (&retry.constant, &retry.exponential) {
            (Some(_), Some(_)) => {
                self.push(path, "only one of constant, exponential can be set");
            }
            (None, None) => self.push(path, "one of constant, exponential is required"),
            (Some(_), None) => {}
            (None, Some(e)) => {
                let p = format!("{path}.exponential");
                if e.factor < 1.0 {
                    self.push(format!("{p}.factor"), "must be at least 1");
                }
                if !(0.0..=1.0).contains(&e.jitter) {
                    self.push(format!("{p}.jitter"), "must be between 0 and 1");
                }
                if e.max_interval < e.initial_interval {
                    self.push(
                        format!("{p}.maxInterval"),
                        "must not be shorter than initialInterval",
                    );
                }
            }
        }
    }
}

/// Checks what deserialization can't: schema version, step ids, template
/// syntax and retry settings. Every violation is reported.
pub fn validate_scenario(s: &Scenario) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    if s.schema_version != SCHEMA_VERSION {
        v.push(
            "schemaVersion",
            format!("unsupported schema version {:?} (want {SCHEMA_VERSION})", s.schema_version),
        );
    }
    for name in s.plugins.keys() {
        if !ID_RE.is_match(name) {
            v.push(format!("plugins.{name}"), "must be a valid identifier");
        }
    }
    v.validate_vars("vars", &s.vars);
    v.validate_vars("secrets", &s.secrets);
    let mut ids = HashSet::new();
    for (i, step) in s.steps.iter().enumerate() {
        v.validate_step(&format!("steps[{i}]"), step, &mut ids);
    }
    v.finish()
}

#[cfg(test)]
mod tests {
    use crate::error::ParseError;
    use crate::scenario::parse_str;

    fn violations(doc: &str) -> Vec<String> {
        match parse_str(doc, "v.yaml") {
            Err(ParseError::Validation(e)) => e.violations.iter().map(|v| v.to_string()).collect(),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => Vec::new(),
        }
    }

    #[test]
    fn valid_scenario_has_no_violations() {
        let doc = "schemaVersion: scenario/v1\nsteps:\n- id: a\n  protocol: http\n  request: {url: x}\n";
        assert!(violations(doc).is_empty());
    }

    #[test]
    fn reports_every_problem() {
        let doc = "\
schemaVersion: scenario/v2
vars:
  bad name: 1
steps:
- id: a
  protocol: http
  request:
    url: '{{vars.x'
- id: a
  include: other.yaml
  request: {}
- protocol: http
  request: {}
  retry:
    exponential:
      initialInterval: 2s
      maxInterval: 1s
      maxRetries: 3
";
        let v = violations(doc);
        assert!(v.iter().any(|m| m.starts_with("schemaVersion: unsupported")), "{v:?}");
        assert!(v.iter().any(|m| m.starts_with("vars.bad name:")), "{v:?}");
        assert!(v.iter().any(|m| m.starts_with("steps[0].request.url:")), "{v:?}");
        assert!(v.iter().any(|m| m == "steps[1].id: duplicate step id \"a\""), "{v:?}");
        assert!(v.iter().any(|m| m == "steps[1].request: can't be combined with include"), "{v:?}");
        assert!(v.iter().any(|m| m.starts_with("steps[2].retry.exponential.maxInterval")), "{v:?}");
    }

    #[test]
    fn retry_needs_exactly_one_backoff() {
        let doc = "schemaVersion: scenario/v1\nsteps:\n- protocol: http\n  request: {}\n  retry: {timeout: true}\n";
        assert_eq!(violations(doc), vec!["steps[0].retry: one of constant, exponential is required"]);
    }
}
