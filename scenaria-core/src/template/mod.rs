//! `{{ expr }}` templates embedded in strings.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorPhase};
use crate::value::Value;

mod arg;
mod ast;
mod env;
mod eval;
mod exec;
mod lazy;
mod parser;
mod token;

pub use arg::ArgDecoder;
pub use ast::{BinaryOp, Expr, UnaryOp};
pub use env::{Env, Lookup};
pub use exec::{execute_value, left_arrow_callee};
pub use lazy::{Lazy, LazyResolution};

#[derive(Debug, Clone)]
pub(crate) enum Part {
    Text(String),
    Param {
        expr: Expr,
        source: String,
        /// YAML quote character surrounding the parameter in argument mode.
        quote: Option<char>,
    },
}

/// A parsed template. Cloning is cheap; the parts are shared.
#[derive(Clone)]
pub struct Template {
    source: String,
    parts: Arc<Vec<Part>>,
    arg_mode: bool,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, Error> {
        Self::parse_with_mode(source, false)
    }

    /// Parses the text of a left-arrow argument document.
    pub fn parse_arg(source: &str) -> Result<Self, Error> {
        Self::parse_with_mode(source, true)
    }

    fn parse_with_mode(source: &str, arg_mode: bool) -> Result<Self, Error> {
        let parts = split(source, arg_mode)
            .map_err(|e| e.wrap(&format!("failed to parse {source:?}")).with_phase(ErrorPhase::Parse))?;
        Ok(Self {
            source: source.to_string(),
            parts: Arc::new(parts),
            arg_mode,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_arg_mode(&self) -> bool {
        self.arg_mode
    }

    pub fn has_params(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Param { .. }))
    }

    pub fn uses_dollar(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Param { expr, .. } if expr.uses_dollar()))
    }

    pub(crate) fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Evaluates the template.
    ///
    /// A template that is exactly one `{{expr}}` yields the typed value; mixed
    /// text yields a string. A template referring to `$` while no actual value
    /// is bound yields a [`Lazy`] instead.
    pub fn execute(&self, env: &Env) -> Result<Value, Error> {
        if !self.has_params() {
            return Ok(Value::String(self.source.clone()));
        }
        if self.uses_dollar() && env.dollar().is_none() {
            return Ok(Value::Lazy(Lazy::new(self.clone(), env.clone())));
        }
        if let [Part::Param { expr, source, .. }] = self.parts.as_slice() {
            return eval::eval(expr, env).map_err(|e| render_error(e, source));
        }
        let mut out = String::new();
        for part in self.parts.iter() {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Param { expr, source, .. } => {
                    let v = eval::eval(expr, env).map_err(|e| render_error(e, source))?;
                    out.push_str(&v.to_text());
                }
            }
        }
        Ok(Value::String(out))
    }
}

pub(crate) fn render_error(e: Error, source: &str) -> Error {
    e.wrap(&format!("failed to execute {{{{{source}}}}}"))
        .with_phase(ErrorPhase::Render)
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("arg_mode", &self.arg_mode)
            .finish()
    }
}

fn split(source: &str, arg_mode: bool) -> Result<Vec<Part>, Error> {
    let mut parts = Vec::new();
    let mut rest = source;
    let mut quote_state = QuoteState::default();

    while let Some(open) = rest.find("{{") {
        let text = &rest[..open];
        if arg_mode {
            quote_state.feed(text);
        }
        if !text.is_empty() {
            parts.push(Part::Text(text.to_string()));
        }
        let inner_start = open + 2;
        let close = find_close(&rest[inner_start..])
            .ok_or_else(|| Error::new("unclosed parameter: missing \"}}\""))?;
        let inner = &rest[inner_start..inner_start + close];
        let expr = parser::parse_expr(inner)?;
        parts.push(Part::Param {
            expr,
            source: inner.trim().to_string(),
            quote: if arg_mode { quote_state.current() } else { None },
        });
        rest = &rest[inner_start + close + 2..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest.to_string()));
    }
    Ok(parts)
}

/// Offset of the `}}` closing a parameter, skipping string literals.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut in_str: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match in_str {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    in_str = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    in_str = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Tracks whether text written so far leaves us inside a YAML flow scalar quote.
#[derive(Debug, Default)]
struct QuoteState {
    quote: Option<char>,
    prev: Option<char>,
}

impl QuoteState {
    fn feed(&mut self, text: &str) {
        for c in text.chars() {
            match self.quote {
                Some('"') if c == '"' && self.prev != Some('\\') => self.quote = None,
                Some('\'') if c == '\'' => self.quote = None,
                Some(_) => {}
                None if (c == '"' || c == '\'') && self.at_scalar_start() => {
                    self.quote = Some(c)
                }
                None => {}
            }
            if c == '\n' {
                self.quote = None;
            }
            self.prev = Some(c);
        }
    }

    fn at_scalar_start(&self) -> bool {
        matches!(self.prev, None | Some(' ' | '\t' | '\n' | ':' | '-' | '[' | '{' | ','))
    }

    fn current(&self) -> Option<char> {
        self.quote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn env(pairs: &[(&str, Value)]) -> Env {
        let data: Map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Env::new(Arc::new(data))
    }

    fn vars(pairs: &[(&str, Value)]) -> Env {
        let m: Map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        env(&[("vars", Value::Map(m))])
    }

    fn run(src: &str, env: &Env) -> Result<Value, Error> {
        Template::parse(src)?.execute(env)
    }

    #[test]
    fn plain_text_is_kept() {
        assert_eq!(run("hello", &vars(&[])).unwrap(), Value::from("hello"));
        assert_eq!(run("{{}}", &vars(&[])).unwrap(), Value::from(""));
    }

    #[test]
    fn single_param_keeps_type() {
        let e = vars(&[("n", Value::Int(2))]);
        assert_eq!(run("{{vars.n + 1}}", &e).unwrap(), Value::Int(3));
        assert_eq!(run("n={{vars.n}}", &e).unwrap(), Value::from("n=2"));
    }

    #[test]
    fn builtins_shadow_data() {
        let e = env(&[("int", Value::from("shadowed"))]);
        assert_eq!(run("{{int('5')}}", &e).unwrap(), Value::Int(5));
        assert_eq!(run("{{type(1.5)}}", &e).unwrap(), Value::from("float"));
        assert_eq!(run("{{size('abc')}}", &e).unwrap(), Value::Int(3));
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = run("{{vars.nope}}", &vars(&[])).unwrap_err();
        assert!(err.to_string().contains("path \".vars.nope\" not found"), "{err}");
        assert_eq!(err.phase(), Some(ErrorPhase::Render));
    }

    #[test]
    fn defined_checks_without_failing() {
        let e = vars(&[("a", Value::Int(1))]);
        assert_eq!(run("{{defined(vars.a)}}", &e).unwrap(), Value::Bool(true));
        assert_eq!(run("{{defined(vars.b)}}", &e).unwrap(), Value::Bool(false));
    }

    #[test]
    fn operators_and_ternary() {
        let e = vars(&[("s", Value::from("ab"))]);
        assert_eq!(run("{{vars.s + 'c'}}", &e).unwrap(), Value::from("abc"));
        assert_eq!(run("{{7 % 4 * 2}}", &e).unwrap(), Value::Int(6));
        assert_eq!(
            run("{{size(vars.s) >= 2 && !false ? 'long' : 'short'}}", &e).unwrap(),
            Value::from("long")
        );
        assert_eq!(run("{{'1' == 1}}", &e).unwrap(), Value::Bool(false));
        assert!(run("{{9223372036854775807 + 1}}", &e)
            .unwrap_err()
            .to_string()
            .contains("overflows int"));
    }

    #[test]
    fn closing_braces_inside_strings() {
        assert_eq!(run("{{'}}'}}", &vars(&[])).unwrap(), Value::from("}}"));
        assert!(Template::parse("{{ vars.a ").is_err());
    }

    #[test]
    fn rendering_twice_is_stable() {
        let e = vars(&[("x", Value::Float(1.5))]);
        let t = Template::parse("x={{vars.x * 2}}").unwrap();
        assert_eq!(t.execute(&e).unwrap(), t.execute(&e).unwrap());
    }

    #[test]
    fn dollar_defers_evaluation() {
        let e = vars(&[("body", Value::from("hi"))]);
        let v = run("{{$ == vars.body}}", &e).unwrap();
        let Value::Lazy(lazy) = v else {
            panic!("expected lazy, got {v:?}")
        };
        assert_eq!(lazy.resolve("hi".into()).unwrap(), Value::Bool(true));
        assert_eq!(lazy.resolve("hello".into()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn quote_state_in_arg_mode() {
        let t = Template::parse_arg("a: \"x {{vars.a}}\"\nb: {{vars.b}}\nc: it's {{vars.c}}").unwrap();
        let quotes: Vec<_> = t
            .parts()
            .iter()
            .filter_map(|p| match p {
                Part::Param { quote, .. } => Some(*quote),
                Part::Text(_) => None,
            })
            .collect();
        assert_eq!(quotes, vec![Some('"'), None, None]);
    }
}
