use std::sync::LazyLock;

use regex::Regex;
use scenaria_core::error::key_segment;
use scenaria_core::value::Value;

use super::value::SecretValue;

static SECRET_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{secrets[^{}]*\}\}").expect("valid regex"));

/// Replaces rendered secret text with the `{{secrets.path}}` it came from.
///
/// Redacting twice is the same as redacting once: text already inside a
/// `{{secrets...}}` reference is never rewritten.
#[derive(Clone, Default)]
pub struct Redactor {
    /// Longest secret first so overlapping secrets redact the widest match.
    entries: Vec<(String, SecretValue)>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a redactor that also covers every scalar leaf of `secrets`.
    pub fn with_secrets(&self, secrets: &Value) -> Self {
        let mut entries = self.entries.clone();
        collect("secrets", secrets, &mut entries);
        entries.sort_by(|a, b| b.1.expose().len().cmp(&a.1.expose().len()));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn redact(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in SECRET_REF_RE.find_iter(text) {
            self.redact_span(&text[last..m.start()], &mut out);
            out.push_str(m.as_str());
            last = m.end();
        }
        self.redact_span(&text[last..], &mut out);
        out
    }

    fn redact_span(&self, mut span: &str, out: &mut String) {
        'scan: while !span.is_empty() {
            for (path, secret) in &self.entries {
                if span.starts_with(secret.expose()) {
                    out.push_str("{{");
                    out.push_str(path);
                    out.push_str("}}");
                    span = &span[secret.expose().len()..];
                    continue 'scan;
                }
            }
            let mut chars = span.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            span = chars.as_str();
        }
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.entries.len())
            .finish()
    }
}

fn collect(path: &str, v: &Value, out: &mut Vec<(String, SecretValue)>) {
    match v {
        Value::Map(m) => {
            for (k, item) in m {
                collect(&format!("{path}{}", key_segment(k)), item, out);
            }
        }
        Value::Seq(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(&format!("{path}[{i}]"), item, out);
            }
        }
        Value::Nil | Value::Func(_) | Value::Assertion(_) | Value::Lazy(_) => {}
        other => {
            let text = other.to_text();
            if !text.is_empty() {
                out.push((path.to_string(), SecretValue::new(text)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(doc: &str) -> Redactor {
        Redactor::new().with_secrets(&serde_yaml::from_str(doc).unwrap())
    }

    #[test]
    fn replaces_secret_text_with_reference() {
        let r = secrets("token: xxxxx\nnested:\n  keys: [k-123]\n");
        assert_eq!(
            r.redact("Authorization: Bearer xxxxx, key=k-123"),
            "Authorization: Bearer {{secrets.token}}, key={{secrets.nested.keys[0]}}"
        );
    }

    #[test]
    fn redaction_is_idempotent() {
        let r = secrets("auth: secrets\nshort: s\n");
        let once = r.redact("secrets and s");
        assert_eq!(once, "{{secrets.auth}} and {{secrets.short}}");
        assert_eq!(r.redact(&once), once);
    }

    #[test]
    fn longest_secret_wins() {
        let r = secrets("a: abc\nb: abcdef\n");
        assert_eq!(r.redact("abcdef abc"), "{{secrets.b}} {{secrets.a}}");
    }

    #[test]
    fn debug_hides_values() {
        let r = secrets("a: hunter2\n");
        assert!(!format!("{r:?}").contains("hunter2"));
    }
}
