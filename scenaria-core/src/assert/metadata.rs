use super::{build, Assertion};
use crate::error::Error;
use crate::value::Value;

/// Builds a matcher for multi-valued metadata such as HTTP headers.
///
/// Keys match case-insensitively and every actual entry is a sequence. A
/// scalar expectation passes when any element equals it, a sequence is matched
/// against the whole entry, and an assertion is tried on the whole entry first
/// and then on each element.
pub fn build_metadata(expected: &Value) -> Assertion {
    let Value::Map(m) = expected else {
        return build(expected);
    };
    let entries: Vec<(String, Value, Assertion)> = m
        .iter()
        .map(|(k, v)| (k.clone(), v.clone(), build(v)))
        .collect();
    Assertion::new(move |actual: &Value| {
        let Some(actual) = actual.as_map() else {
            return Err(Error::new(format!(
                "expected metadata but got {}",
                actual.kind_name()
            )));
        };
        let errors = entries
            .iter()
            .filter_map(|(key, want, child)| {
                let result = match actual.get_ignore_ascii_case(key) {
                    Some(got) => assert_entry(want, child, got),
                    None => Err(Error::new("not found")),
                };
                result.err().map(|e| e.with_key(key))
            })
            .collect();
        Error::collect(errors)
    })
}

fn assert_entry(want: &Value, child: &Assertion, got: &Value) -> Result<(), Error> {
    let items = match got {
        Value::Seq(items) => items.as_slice(),
        single => return child.assert(single),
    };
    match want {
        Value::Seq(_) => child.assert(got),
        Value::Assertion(_) | Value::Lazy(_) => {
            let whole = child.assert(got);
            if whole.is_ok() || items.iter().any(|v| child.assert(v).is_ok()) {
                Ok(())
            } else {
                whole
            }
        }
        _ => {
            if items.iter().any(|v| child.assert(v).is_ok()) {
                Ok(())
            } else {
                Err(Error::new(format!(
                    "expected {want} but got {}",
                    Value::Seq(items.to_vec())
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn headers() -> Value {
        yaml("Content-Type: [application/json]\nSet-Cookie: [a=1, b=2]\n")
    }

    #[test]
    fn keys_ignore_case_and_scalars_match_any_element() {
        let a = build_metadata(&yaml("content-type: application/json\nset-cookie: b=2\n"));
        a.assert(&headers()).unwrap();
    }

    #[test]
    fn sequences_match_whole_entry() {
        build_metadata(&yaml("Set-Cookie: [a=1, b=2]\n"))
            .assert(&headers())
            .unwrap();
        let err = build_metadata(&yaml("Set-Cookie: [a=1]\n"))
            .assert(&headers())
            .unwrap_err();
        assert!(err.to_string().contains("expected 1 elements but got 2"), "{err}");
    }

    #[test]
    fn missing_and_mismatched_entries() {
        let err = build_metadata(&yaml("X-Trace: abc\nContent-Type: text/plain\n"))
            .assert(&headers())
            .unwrap_err();
        let msgs: Vec<_> = err.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(msgs[0], ".X-Trace: not found");
        assert!(msgs[1].starts_with(".Content-Type: expected \"text/plain\""), "{}", msgs[1]);
    }

    #[test]
    fn assertions_try_whole_entry_then_elements() {
        let length_two = Value::Assertion(Assertion::new(|v: &Value| match v.size() {
            Ok(2) => Ok(()),
            _ => Err(Error::new("want two")),
        }));
        let mut m = crate::value::Map::new();
        m.insert("set-cookie".to_string(), length_two);
        build_metadata(&Value::Map(m)).assert(&headers()).unwrap();
    }
}
