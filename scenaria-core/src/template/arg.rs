//! Left-arrow argument documents.
//!
//! A multi-line string argument is rendered as YAML text: interpolated values
//! that can't be spliced as text are replaced by placeholders, which the
//! decoder restores after parsing.

use serde::de::DeserializeOwned;

use super::exec::expand_left_arrows;
use super::{eval, render_error, Env, Lazy, Part, Template};
use crate::error::{Error, ErrorPhase};
use crate::value::{decode, from_yaml, Map, Value};

const PLACEHOLDER_PREFIX: &str = "__scenaria_arg_";
const PLACEHOLDER_SUFFIX: &str = "__";

fn placeholder(n: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{n}{PLACEHOLDER_SUFFIX}")
}

enum Source {
    Value(Value),
    Text {
        text: String,
        placeholders: Vec<Value>,
        env: Env,
    },
}

/// Hands a left-arrow argument to a template function.
pub struct ArgDecoder {
    source: Source,
}

impl ArgDecoder {
    pub fn from_value(v: Value) -> Self {
        Self {
            source: Source::Value(v),
        }
    }

    pub(crate) fn from_text(text: String, placeholders: Vec<Value>, env: Env) -> Self {
        Self {
            source: Source::Text {
                text,
                placeholders,
                env,
            },
        }
    }

    /// Decodes the argument with mapping order preserved.
    pub fn decode(&self) -> Result<Value, Error> {
        match &self.source {
            Source::Value(v) => Ok(v.clone()),
            Source::Text {
                text,
                placeholders,
                env,
            } => {
                let raw: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
                    Error::new(format!("failed to decode argument: {e}")).with_phase(ErrorPhase::Parse)
                })?;
                let restored = restore(from_yaml(&raw), placeholders);
                expand_left_arrows(&restored, env)
            }
        }
    }

    /// Decodes into a host type through its serde representation.
    pub fn decode_into<T: DeserializeOwned>(&self) -> Result<T, Error> {
        decode(&self.decode()?).map_err(|e| e.wrap("invalid argument"))
    }
}

fn restore(v: Value, placeholders: &[Value]) -> Value {
    match v {
        Value::String(s) => restore_str(s, placeholders),
        Value::Seq(items) => Value::Seq(items.into_iter().map(|x| restore(x, placeholders)).collect()),
        Value::Map(m) => Value::Map(
            m.into_iter()
                .map(|(k, x)| (restore_str(k, placeholders).to_text(), restore(x, placeholders)))
                .collect::<Map>(),
        ),
        other => other,
    }
}

fn restore_str(s: String, placeholders: &[Value]) -> Value {
    if !s.contains(PLACEHOLDER_PREFIX) {
        return Value::String(s);
    }
    for (i, v) in placeholders.iter().enumerate() {
        if s == placeholder(i) {
            return v.clone();
        }
    }
    let mut out = s;
    for (i, v) in placeholders.iter().enumerate().rev() {
        out = out.replace(&placeholder(i), &v.to_text());
    }
    Value::String(out)
}

impl Template {
    /// Renders an argument-mode template to YAML text plus placeholder values.
    pub(crate) fn render_arg(&self, env: &Env) -> Result<(String, Vec<Value>), Error> {
        let mut out = String::new();
        let mut placeholders = Vec::new();
        for part in self.parts() {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Param {
                    expr: super::Expr::LeftArrow { .. },
                    source,
                    ..
                } => {
                    out.push_str("{{");
                    out.push_str(source);
                    out.push_str("}}");
                }
                Part::Param {
                    expr,
                    source,
                    quote,
                } => {
                    let v = if expr.uses_dollar() && env.dollar().is_none() {
                        let single = Template::parse(&format!("{{{{{source}}}}}"))?;
                        Value::Lazy(Lazy::new(single, env.clone()))
                    } else {
                        eval::eval(expr, env).map_err(|e| render_error(e, source))?
                    };
                    let line_start = out.rfind('\n').map(|i| i + 1).unwrap_or(0);
                    let column = out[line_start..].chars().count();
                    out.push_str(&splice(v, *quote, column, &mut placeholders));
                }
            }
        }
        Ok((out, placeholders))
    }
}

fn splice(v: Value, quote: Option<char>, column: usize, placeholders: &mut Vec<Value>) -> String {
    let mut stash = |v: Value| {
        placeholders.push(v);
        placeholder(placeholders.len() - 1)
    };
    match (quote, v) {
        (_, v @ (Value::Int(_) | Value::Uint(_) | Value::Float(_) | Value::Bool(_))) => {
            v.to_text()
        }
        (Some('"'), Value::String(s)) => s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\t', "\\t"),
        (Some(_), Value::String(s)) if !s.contains('\n') => s.replace('\'', "''"),
        (None, Value::String(s)) => reindent(&s, column),
        (None, Value::Nil) => "null".to_string(),
        (_, v) => stash(v),
    }
}

/// Prefixes every line after the first with `column` spaces; blank lines stay blank.
pub(crate) fn reindent(s: &str, column: usize) -> String {
    let pad = " ".repeat(column);
    let mut out = String::with_capacity(s.len());
    for (i, line) in s.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&pad);
            }
        }
        out.push_str(line);
    }
    out
}
