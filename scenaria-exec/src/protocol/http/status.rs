use reqwest::StatusCode;
use scenaria_core::assert::{self, Assertion};
use scenaria_core::error::Error;
use scenaria_core::value::Value;

/// `200 OK`, or just the number for codes without a reason phrase.
pub fn status_text(code: u16) -> String {
    match StatusCode::from_u16(code).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("{code} {reason}"),
        None => code.to_string(),
    }
}

/// Matches a status code given as a number (`200`), a numeric string (`"200"`)
/// or a reason phrase (`"OK"`, `"Not Found"`, `"NotFound"`). Assertions and
/// lazy templates are applied to the numeric code.
pub fn code_assertion(expected: &Value) -> Assertion {
    let want = match expected {
        Value::Int(n) => u16::try_from(*n).ok().map(Want::Code),
        Value::Uint(n) => u16::try_from(*n).ok().map(Want::Code),
        Value::String(s) => Some(match s.trim().parse::<u16>() {
            Ok(n) => Want::Code(n),
            Err(_) => Want::Reason(normalize(s)),
        }),
        _ => None,
    };
    let Some(want) = want else {
        return assert::build(expected);
    };
    let shown = expected.to_text();
    Assertion::new(move |actual: &Value| {
        let code = match actual {
            Value::Int(n) => u16::try_from(*n).ok(),
            Value::Uint(n) => u16::try_from(*n).ok(),
            _ => None,
        };
        let Some(code) = code else {
            return Err(Error::new(format!("expected status code but got {actual}")));
        };
        let ok = match &want {
            Want::Code(n) => *n == code,
            Want::Reason(r) => StatusCode::from_u16(code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .is_some_and(|reason| &normalize(reason) == r),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::new(format!(
                "expected code is {shown} but got {}",
                status_text(code)
            )))
        }
    })
}

enum Want {
    Code(u16),
    Reason(String),
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_symbolic_codes() {
        let ok = Value::Int(200);
        for want in [Value::Int(200), Value::from("200"), Value::from("OK")] {
            code_assertion(&want).assert(&ok).unwrap();
        }
        code_assertion(&Value::from("Not Found"))
            .assert(&Value::Int(404))
            .unwrap();
        code_assertion(&Value::from("NotFound"))
            .assert(&Value::Int(404))
            .unwrap();
    }

    #[test]
    fn mismatch_names_both_codes() {
        let err = code_assertion(&Value::from("OK"))
            .assert(&Value::Int(500))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected code is OK but got 500 Internal Server Error"
        );
    }

    #[test]
    fn status_text_formats() {
        assert_eq!(status_text(200), "200 OK");
        assert_eq!(status_text(599), "599");
    }
}
