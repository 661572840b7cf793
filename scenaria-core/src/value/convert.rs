use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta};
use regex::Regex;

use super::{duration, Type, Value, ValueError};

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("valid regex"));

static UINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0|[1-9][0-9]*)$").expect("valid regex"));

pub(crate) fn format_time(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Type {
    /// Converts `v` to this type, failing when information would be lost.
    pub fn convert(&self, v: &Value) -> Result<Value, ValueError> {
        let fail = |reason: Option<String>| Err(ValueError::conversion(v, *self, reason));
        match (self, v) {
            (Type::Any, _) => Ok(v.clone()),
            (t, v) if *t == v.type_of() => Ok(v.clone()),

            (Type::Nil, _) => fail(None),

            (Type::Int, Value::Uint(u)) => match i64::try_from(*u) {
                Ok(i) => Ok(Value::Int(i)),
                Err(_) => fail(Some("overflows int".into())),
            },
            (Type::Int, Value::Float(f)) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Ok(Value::Int(f.trunc() as i64))
                } else {
                    fail(Some("overflows int".into()))
                }
            }
            (Type::Int, Value::String(s)) => {
                if !INT_RE.is_match(s) {
                    return fail(Some("invalid syntax".into()));
                }
                s.parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| fail(Some("overflows int".into())))
            }
            (Type::Int, Value::Duration(d)) => match d.num_nanoseconds() {
                Some(n) => Ok(Value::Int(n)),
                None => fail(Some("overflows int".into())),
            },

            (Type::Uint, Value::Int(i)) => match u64::try_from(*i) {
                Ok(u) => Ok(Value::Uint(u)),
                Err(_) => fail(Some("overflows uint".into())),
            },
            (Type::Uint, Value::Float(f)) => {
                if f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64 {
                    Ok(Value::Uint(f.trunc() as u64))
                } else {
                    fail(Some("overflows uint".into()))
                }
            }
            (Type::Uint, Value::String(s)) => {
                if !UINT_RE.is_match(s) {
                    return fail(Some("invalid syntax".into()));
                }
                s.parse::<u64>()
                    .map(Value::Uint)
                    .or_else(|_| fail(Some("overflows uint".into())))
            }

            (Type::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            (Type::Float, Value::Uint(u)) => Ok(Value::Float(*u as f64)),
            (Type::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) if !s.trim().is_empty() => Ok(Value::Float(f)),
                _ => fail(Some("invalid syntax".into())),
            },

            (Type::Bool, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => fail(Some("invalid syntax".into())),
            },

            (Type::String, Value::Bytes(b)) => match String::from_utf8(b.clone()) {
                Ok(s) => Ok(Value::String(s)),
                Err(_) => fail(Some("invalid UTF-8".into())),
            },
            (Type::String, Value::Int(i)) => Ok(Value::String(i.to_string())),
            (Type::String, Value::Uint(u)) => Ok(Value::String(u.to_string())),
            (Type::String, Value::Float(f)) => Ok(Value::String(f.to_string())),
            (Type::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (Type::String, Value::Time(t)) => Ok(Value::String(format_time(t))),
            (Type::String, Value::Duration(d)) => Ok(Value::String(duration::format(*d))),
            (Type::String, Value::Object(o)) => match o.enum_name() {
                Some(name) => Ok(Value::String(name)),
                None => fail(None),
            },

            (Type::Bytes, Value::String(s)) => Ok(Value::Bytes(s.as_bytes().to_vec())),

            (Type::Time, Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(t) => Ok(Value::Time(t)),
                Err(e) => fail(Some(e.to_string())),
            },

            (Type::Duration, Value::String(s)) => match duration::parse(s) {
                Ok(d) => Ok(Value::Duration(d)),
                Err(e) => fail(Some(e.to_string())),
            },
            (Type::Duration, Value::Int(n)) => Ok(Value::Duration(TimeDelta::nanoseconds(*n))),

            _ => fail(None),
        }
    }

    /// Whether a value of this type can hold `v` without conversion.
    pub fn accepts(&self, v: &Value) -> bool {
        *self == Type::Any || *self == v.type_of()
    }
}
