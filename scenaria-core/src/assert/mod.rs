//! Recursive matchers built from expected documents.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorPhase, PathSegment};
use crate::query;
use crate::value::{Callable, Value};

mod builtin;
mod metadata;

pub use builtin::functions;
pub use metadata::build_metadata;

pub trait Assert: Send + Sync {
    fn assert(&self, actual: &Value) -> Result<(), Error>;
}

impl<F> Assert for F
where
    F: Fn(&Value) -> Result<(), Error> + Send + Sync,
{
    fn assert(&self, actual: &Value) -> Result<(), Error> {
        self(actual)
    }
}

/// A function from an actual value to `ok` or a path-annotated error.
#[derive(Clone)]
pub struct Assertion(Arc<dyn Assert>);

impl Assertion {
    pub fn new(a: impl Assert + 'static) -> Self {
        Self(Arc::new(a))
    }

    pub fn assert(&self, actual: &Value) -> Result<(), Error> {
        self.0
            .assert(actual)
            .map_err(|e| e.with_phase(ErrorPhase::Assert))
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Assertion")
    }
}

/// Builds the matcher for an expected document.
///
/// Mappings check each expected key against the actual value, sequences match
/// positionally with equal length, lazy templates are resolved with the actual
/// value, and every other leaf is compared with coercing equality.
pub fn build(expected: &Value) -> Assertion {
    match expected {
        Value::Map(m) => {
            let entries: Vec<(String, Assertion)> =
                m.iter().map(|(k, v)| (k.clone(), build(v))).collect();
            Assertion::new(move |actual: &Value| {
                let errors = entries
                    .iter()
                    .filter_map(|(key, child)| {
                        let result = match query::select(actual, &PathSegment::Key(key.clone()), false) {
                            Some(v) => child.assert(&v),
                            None => Err(Error::new("not found")),
                        };
                        result.err().map(|e| e.with_key(key))
                    })
                    .collect();
                Error::collect(errors)
            })
        }
        Value::Seq(items) => {
            let items: Vec<Assertion> = items.iter().map(build).collect();
            Assertion::new(move |actual: &Value| {
                let actual_items = match as_items(actual) {
                    Some(a) => a,
                    None => {
                        return Err(Error::new(format!(
                            "expected sequence but got {}",
                            actual.kind_name()
                        )))
                    }
                };
                let mut errors = Vec::new();
                if actual_items.len() != items.len() {
                    errors.push(Error::new(format!(
                        "expected {} elements but got {}",
                        items.len(),
                        actual_items.len()
                    )));
                }
                for (i, (want, got)) in items.iter().zip(&actual_items).enumerate() {
                    if let Err(e) = want.assert(got) {
                        errors.push(e.with_index(i));
                    }
                }
                Error::collect(errors)
            })
        }
        Value::Assertion(a) => a.clone(),
        Value::Lazy(lazy) => {
            let lazy = lazy.clone();
            Assertion::new(move |actual: &Value| {
                let result = lazy.resolve(actual.clone())?;
                match result {
                    Value::Bool(true) => Ok(()),
                    Value::Bool(false) => Err(Error::new(format!(
                        "assertion {} failed: $ is {actual}",
                        lazy.source()
                    ))),
                    Value::Assertion(a) => a.assert(actual),
                    other => equal(&other, actual),
                }
            })
        }
        Value::Func(Callable::Template(f)) => match f.exec(Value::Nil) {
            Ok(Value::Assertion(a)) => a,
            _ => leaf(expected.clone()),
        },
        other => leaf(other.clone()),
    }
}

fn leaf(expected: Value) -> Assertion {
    Assertion::new(move |actual: &Value| equal(&expected, actual))
}

pub(crate) fn as_items(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Seq(items) => Some(items.clone()),
        Value::Object(o) => match o.to_value()? {
            Value::Seq(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Coercing equality: numbers compare by value, an expected string matches an
/// enum's name, structured values compare element-wise.
pub fn equal(expected: &Value, actual: &Value) -> Result<(), Error> {
    if let (Value::String(want), Value::Object(o)) = (expected, actual) {
        if let Some(name) = o.enum_name() {
            if &name == want {
                return Ok(());
            }
            return Err(Error::new(format!("expected {expected} but got {name:?}")));
        }
    }
    match expected.equal(actual) {
        Ok(true) => Ok(()),
        Ok(false) => Err(mismatch(expected, actual)),
        Err(_) => Err(mismatch(expected, actual)),
    }
}

fn mismatch(expected: &Value, actual: &Value) -> Error {
    let (want, got) = (expected.kind_name(), actual.kind_name());
    if want == got || (expected.is_numeric() && actual.is_numeric()) {
        Error::new(format!("expected {expected} but got {actual}"))
    } else {
        Error::new(format!("expected {expected} ({want}) but got {actual} ({got})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn equal_documents_pass_with_numeric_coercion() {
        let a = build(&yaml("a: 1\nb: [x, 2.0]\n"));
        a.assert(&yaml("a: 1.0\nb: [x, 2]\nextra: true\n")).unwrap();
    }

    #[test]
    fn mismatch_paths_and_messages() {
        let a = build(&yaml("body:\n  message: world\n"));
        let err = a.assert(&yaml("body:\n  message: hello\n")).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, ".body.message");
        assert_eq!(errors[0].message, "expected \"world\" but got \"hello\"");
    }

    #[test]
    fn sibling_failures_aggregate_in_order() {
        let a = build(&yaml("a: 1\nb: 2\nc: 3\n"));
        let err = a.assert(&yaml("a: 0\nb: 2\n")).unwrap_err();
        let paths: Vec<_> = err.errors().iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![".a", ".c"]);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn sequence_length_mismatch_still_checks_prefix() {
        let a = build(&yaml("[1, 2, 3]"));
        let err = a.assert(&yaml("[1, 5]")).unwrap_err();
        let msgs: Vec<_> = err.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            msgs,
            vec!["expected 3 elements but got 2", "[1]: expected 2 but got 5"]
        );
    }

    #[test]
    fn kind_mismatch_mentions_kinds() {
        let err = build(&Value::from("1")).assert(&Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "expected \"1\" (string) but got 1 (int)");
    }

    #[test]
    fn nested_assertions_are_used_directly() {
        let mut m = Map::new();
        m.insert(
            "n".to_string(),
            Value::Assertion(Assertion::new(|v: &Value| {
                if v.is_numeric() {
                    Ok(())
                } else {
                    Err(Error::new("not a number"))
                }
            })),
        );
        let a = build(&Value::Map(m));
        a.assert(&yaml("n: 3")).unwrap();
        let err = a.assert(&yaml("n: x")).unwrap_err();
        assert_eq!(err.to_string(), ".n: not a number");
        assert_eq!(err.phase(), Some(ErrorPhase::Assert));
    }
}
