use std::sync::LazyLock;

use regex::Regex;

use super::arg::ArgDecoder;
use super::{eval, parser, render_error, Env, Template};
use crate::error::{Error, ErrorPhase};
use crate::value::{Callable, Map, Value};

static BRACED_ARROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\s*(.+?)\s*<-\s*\}\}$").expect("valid regex"));

static FLOW_ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\s*([A-Za-z_$][A-Za-z0-9_.\-]*)\s*<-\s*\}$").expect("valid regex")
});

static BARE_ARROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\-]*)\s*<-$").expect("valid regex"));

/// Returns the function expression of a left-arrow key (`{{fn <-}}`, `{fn <-}` or `fn <-`).
pub fn left_arrow_callee(key: &str) -> Option<&str> {
    let key = key.trim();
    [&*BRACED_ARROW_RE, &*FLOW_ARROW_RE, &*BARE_ARROW_RE]
        .into_iter()
        .find_map(|re| re.captures(key))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Renders every template in a document. Mappings with a single left-arrow key
/// are replaced by the function's result.
pub fn execute_value(v: &Value, env: &Env) -> Result<Value, Error> {
    match v {
        Value::String(s) => Template::parse(s)?.execute(env),
        Value::Seq(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| execute_value(item, env).map_err(|e| e.with_index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Seq),
        Value::Map(m) => {
            if let Some((key, arg, callee)) = single_left_arrow(m) {
                return call_left_arrow(callee, arg, env).map_err(|e| e.with_key(key));
            }
            let mut out = Map::with_capacity(m.len());
            for (k, item) in m {
                let key = execute_key(k, env)?;
                let value = execute_value(item, env).map_err(|e| e.with_key(k))?;
                out.insert(key, value);
            }
            Ok(Value::Map(out))
        }
        other => Ok(other.clone()),
    }
}

fn single_left_arrow(m: &Map) -> Option<(&String, &Value, &str)> {
    if m.len() != 1 {
        return None;
    }
    let (k, v) = m.get_index(0)?;
    left_arrow_callee(k).map(|callee| (k, v, callee))
}

fn execute_key(key: &str, env: &Env) -> Result<String, Error> {
    let t = Template::parse(key).map_err(|e| e.with_key(key))?;
    if !t.has_params() {
        return Ok(key.to_string());
    }
    match t.execute(env).map_err(|e| e.with_key(key))? {
        Value::Lazy(_) => Err(Error::new("$ can't be used in a mapping key")
            .with_phase(ErrorPhase::Render)
            .with_key(key)),
        v => Ok(v.to_text()),
    }
}

fn call_left_arrow(callee: &str, arg: &Value, env: &Env) -> Result<Value, Error> {
    let expr = parser::parse_expr(callee).map_err(|e| e.with_phase(ErrorPhase::Parse))?;
    let f = match eval::eval(&expr, env).map_err(|e| render_error(e, callee))? {
        Value::Func(Callable::Template(f)) => f,
        other => {
            return Err(Error::new(format!(
                "{callee} is not a left arrow function ({})",
                other.kind_name()
            ))
            .with_phase(ErrorPhase::Render))
        }
    };
    let decoder = match arg {
        Value::String(s) if s.contains('\n') => {
            let t = Template::parse_arg(s)?;
            let (text, placeholders) = t.render_arg(env)?;
            ArgDecoder::from_text(text, placeholders, env.clone())
        }
        other => ArgDecoder::from_value(execute_value(other, env)?),
    };
    let arg = f.unmarshal_arg(&decoder)?;
    f.exec(arg).map_err(|e| e.with_phase(ErrorPhase::Render))
}

/// Expands left-arrow keys in an already rendered document.
pub(crate) fn expand_left_arrows(v: &Value, env: &Env) -> Result<Value, Error> {
    match v {
        Value::Seq(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| expand_left_arrows(item, env).map_err(|e| e.with_index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Seq),
        Value::Map(m) => {
            if let Some((key, arg, callee)) = single_left_arrow(m) {
                let arg = expand_left_arrows(arg, env).map_err(|e| e.with_key(key))?;
                return call_rendered_left_arrow(callee, arg, env).map_err(|e| e.with_key(key));
            }
            let mut out = Map::with_capacity(m.len());
            for (k, item) in m {
                out.insert(
                    k.clone(),
                    expand_left_arrows(item, env).map_err(|e| e.with_key(k))?,
                );
            }
            Ok(Value::Map(out))
        }
        other => Ok(other.clone()),
    }
}

fn call_rendered_left_arrow(callee: &str, arg: Value, env: &Env) -> Result<Value, Error> {
    let expr = parser::parse_expr(callee)?;
    match eval::eval(&expr, env).map_err(|e| render_error(e, callee))? {
        Value::Func(Callable::Template(f)) => {
            let arg = f.unmarshal_arg(&ArgDecoder::from_value(arg))?;
            f.exec(arg)
        }
        other => Err(Error::new(format!(
            "{callee} is not a left arrow function ({})",
            other.kind_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::value::TemplateFunc;

    struct Join;

    impl TemplateFunc for Join {
        fn name(&self) -> &str {
            "join"
        }

        fn exec(&self, arg: Value) -> Result<Value, Error> {
            let m = arg.as_map().ok_or_else(|| Error::new("join wants a map"))?;
            let sep = m.get("sep").map(Value::to_text).unwrap_or_default();
            let items = m
                .get("items")
                .and_then(Value::as_seq)
                .ok_or_else(|| Error::new("items required"))?;
            Ok(Value::String(
                items.iter().map(Value::to_text).collect::<Vec<_>>().join(&sep),
            ))
        }
    }

    fn env() -> Env {
        let vars: Map = [("name".to_string(), Value::from("bob"))].into_iter().collect();
        let root: Map = [
            ("vars".to_string(), Value::Map(vars)),
            (
                "join".to_string(),
                Value::Func(Callable::Template(Arc::new(Join))),
            ),
        ]
        .into_iter()
        .collect();
        Env::new(Arc::new(root))
    }

    #[test]
    fn recognises_left_arrow_keys() {
        assert_eq!(left_arrow_callee("{{assert.length <-}}"), Some("assert.length"));
        assert_eq!(left_arrow_callee("{length <-}"), Some("length"));
        assert_eq!(left_arrow_callee("length <-"), Some("length"));
        assert_eq!(left_arrow_callee("length"), None);
        assert_eq!(left_arrow_callee("{{vars.a}}"), None);
    }

    #[test]
    fn walks_documents_and_renders_keys() {
        let doc: Value = serde_yaml::from_str("hello-{{vars.name}}: ['{{vars.name}}', 1]\n").unwrap();
        let out = execute_value(&doc, &env()).unwrap();
        let m = out.as_map().unwrap();
        assert_eq!(
            m.get("hello-bob"),
            Some(&Value::Seq(vec![Value::from("bob"), Value::Int(1)]))
        );
    }

    #[test]
    fn left_arrow_with_structured_arg() {
        let doc: Value =
            serde_yaml::from_str("greeting:\n  join <-:\n    sep: ', '\n    items: [hi, '{{vars.name}}']\n")
                .unwrap();
        let out = execute_value(&doc, &env()).unwrap();
        assert_eq!(out.as_map().unwrap().get("greeting"), Some(&Value::from("hi, bob")));
    }

    #[test]
    fn left_arrow_with_text_arg_nests() {
        let doc: Value = serde_yaml::from_str(
            "'{{join <-}}': |\n  sep: '-'\n  items:\n  - a\n  - '{{join <-}}':\n      sep: ''\n      items: [b, c]\n",
        )
        .unwrap();
        let out = execute_value(&doc, &env()).unwrap();
        assert_eq!(out, Value::from("a-bc"));
    }

    #[test]
    fn errors_carry_document_path() {
        let doc: Value = serde_yaml::from_str("a:\n  b:\n  - '{{vars.missing}}'\n").unwrap();
        let err = execute_value(&doc, &env()).unwrap_err();
        assert!(err.to_string().starts_with(".a.b[0]: "), "{err}");
    }
}
