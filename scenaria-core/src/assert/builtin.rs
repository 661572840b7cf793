use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use super::{build, Assertion};
use crate::error::Error;
use crate::value::{Callable, Map, TemplateFunc, Type, Value};

type Make = fn(Value) -> Result<Assertion, Error>;

/// A predicate constructor exposed to templates, e.g. `{{assert.length(3)}}`
/// or the left-arrow key `length <-`.
struct AssertFunc {
    name: &'static str,
    make: Make,
}

impl TemplateFunc for AssertFunc {
    fn name(&self) -> &str {
        self.name
    }

    fn exec(&self, arg: Value) -> Result<Value, Error> {
        (self.make)(arg)
            .map(Value::Assertion)
            .map_err(|e| e.wrap(self.name))
    }
}

const FUNCS: [(&str, Make); 12] = [
    ("and", and),
    ("contains", contains),
    ("greater", greater),
    ("greaterOrEqual", greater_or_equal),
    ("length", length),
    ("less", less),
    ("lessOrEqual", less_or_equal),
    ("nop", nop),
    ("notContains", not_contains),
    ("notZero", not_zero),
    ("or", or),
    ("regexp", regexp),
];

/// Assertion functions by name, as exposed under `assert.` and at top level.
pub fn functions() -> Map {
    FUNCS
        .iter()
        .map(|&(name, make)| {
            let f: Arc<dyn TemplateFunc> = Arc::new(AssertFunc { name, make });
            (name.to_string(), Value::Func(Callable::Template(f)))
        })
        .collect()
}

fn length(arg: Value) -> Result<Assertion, Error> {
    let inner = build(&arg);
    Ok(Assertion::new(move |actual: &Value| {
        let n = actual
            .size()
            .map_err(|_| Error::new(format!("{} has no length", actual.kind_name())))?;
        inner
            .assert(&Value::Int(n as i64))
            .map_err(|e| e.wrap("unexpected length"))
    }))
}

fn items_of(actual: &Value) -> Result<Vec<Value>, Error> {
    super::as_items(actual)
        .ok_or_else(|| Error::new(format!("expected sequence but got {}", actual.kind_name())))
}

fn contains(arg: Value) -> Result<Assertion, Error> {
    let inner = build(&arg);
    Ok(Assertion::new(move |actual: &Value| {
        let items = items_of(actual)?;
        let mut last = None;
        for item in &items {
            match inner.assert(item) {
                Ok(()) => return Ok(()),
                Err(e) => last = Some(e),
            }
        }
        Err(match last {
            Some(e) => e.wrap("doesn't contain expected value"),
            None => Error::new("doesn't contain expected value: empty sequence"),
        })
    }))
}

fn not_contains(arg: Value) -> Result<Assertion, Error> {
    let inner = build(&arg);
    Ok(Assertion::new(move |actual: &Value| {
        let items = items_of(actual)?;
        for (i, item) in items.iter().enumerate() {
            if inner.assert(item).is_ok() {
                return Err(Error::new(format!("contains unexpected value {item}")).with_index(i));
            }
        }
        Ok(())
    }))
}

fn compare(
    arg: Value,
    accept: fn(Ordering) -> bool,
    relation: &'static str,
) -> Result<Assertion, Error> {
    if arg.is_nil() {
        return Err(Error::new("expected value is required"));
    }
    Ok(Assertion::new(move |actual: &Value| {
        let ord = actual.compare(&arg).map_err(|_| {
            Error::new(format!(
                "can't compare {} with {}",
                actual.kind_name(),
                arg.kind_name()
            ))
        })?;
        if accept(ord) {
            Ok(())
        } else {
            Err(Error::new(format!("must be {relation} {arg} but got {actual}")))
        }
    }))
}

fn greater(arg: Value) -> Result<Assertion, Error> {
    compare(arg, Ordering::is_gt, "greater than")
}

fn greater_or_equal(arg: Value) -> Result<Assertion, Error> {
    compare(arg, Ordering::is_ge, "greater than or equal to")
}

fn less(arg: Value) -> Result<Assertion, Error> {
    compare(arg, Ordering::is_lt, "less than")
}

fn less_or_equal(arg: Value) -> Result<Assertion, Error> {
    compare(arg, Ordering::is_le, "less than or equal to")
}

/// The pattern is compiled here; an invalid one fails when asserting.
fn regexp(arg: Value) -> Result<Assertion, Error> {
    let pattern = match &arg {
        Value::String(s) => s.clone(),
        other => return Err(Error::new(format!("pattern must be a string but got {other}"))),
    };
    let compiled = Regex::new(&pattern).map_err(|e| e.to_string());
    Ok(Assertion::new(move |actual: &Value| {
        let re = compiled
            .as_ref()
            .map_err(|e| Error::new(format!("invalid pattern {pattern:?}: {e}")))?;
        let text = match actual {
            Value::String(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|_| Error::new("expected UTF-8 text but got invalid bytes"))?,
            other => match Type::String.convert(other) {
                Ok(Value::String(s)) => s,
                _ => {
                    return Err(Error::new(format!(
                        "expected string but got {}",
                        other.kind_name()
                    )))
                }
            },
        };
        if re.is_match(&text) {
            Ok(())
        } else {
            Err(Error::new(format!("{text:?} doesn't match regexp {pattern:?}")))
        }
    }))
}

fn not_zero(_arg: Value) -> Result<Assertion, Error> {
    Ok(Assertion::new(|actual: &Value| {
        if actual.is_zero() {
            Err(Error::new(format!("expected non-zero value but got {actual}")))
        } else {
            Ok(())
        }
    }))
}

fn nop(_arg: Value) -> Result<Assertion, Error> {
    Ok(Assertion::new(|_: &Value| Ok(())))
}

fn assertions_of(arg: Value) -> Result<Vec<Assertion>, Error> {
    let items = match arg {
        Value::Seq(items) => items,
        Value::Nil => Vec::new(),
        other => vec![other],
    };
    if items.is_empty() {
        return Err(Error::new("at least one assertion is required"));
    }
    Ok(items.iter().map(build).collect())
}

fn and(arg: Value) -> Result<Assertion, Error> {
    let all = assertions_of(arg)?;
    Ok(Assertion::new(move |actual: &Value| {
        let errors = all.iter().filter_map(|a| a.assert(actual).err()).collect();
        Error::collect(errors)
    }))
}

fn or(arg: Value) -> Result<Assertion, Error> {
    let any = assertions_of(arg)?;
    Ok(Assertion::new(move |actual: &Value| {
        let mut errors = Vec::new();
        for a in &any {
            match a.assert(actual) {
                Ok(()) => return Ok(()),
                Err(e) => errors.push(e),
            }
        }
        Error::collect(errors).map_err(|e| e.wrap("all assertions failed"))
    }))
}
