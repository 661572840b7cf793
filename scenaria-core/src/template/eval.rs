use super::ast::{BinaryOp, Expr, UnaryOp};
use super::env::Env;
use crate::error::{Error, PathSegment};
use crate::query;
use crate::value::{Callable, Value, ValueError};

fn value_err(e: ValueError) -> Error {
    Error::new(e.to_string())
}

fn not_found(expr: &Expr) -> Error {
    match expr.path_text() {
        Some(path) => Error::new(format!("path \".{path}\" not found")),
        None => Error::new("path not found"),
    }
}

pub(crate) fn eval(expr: &Expr, env: &Env) -> Result<Value, Error> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Dollar => env
            .dollar()
            .cloned()
            .ok_or_else(|| Error::new("$ is not bound to an actual value here")),
        Expr::Ident(name) => {
            if let Some(f) = env.types().function(name) {
                return Ok(Value::Func(f));
            }
            env.lookup(name).ok_or_else(|| not_found(expr))
        }
        Expr::Selector { base, name } => {
            let base_value = eval(base, env)?;
            if let Value::Object(o) = &base_value {
                if o.method_signature(name).is_some() {
                    return Ok(Value::Func(Callable::Method {
                        receiver: o.clone(),
                        name: name.clone(),
                    }));
                }
            }
            query::select(&base_value, &PathSegment::Key(name.clone()), false)
                .ok_or_else(|| not_found(expr))
        }
        Expr::Index { base, index } => {
            let base_value = eval(base, env)?;
            let seg = match eval(index, env)? {
                Value::Int(i) if i >= 0 => PathSegment::Index(i as usize),
                Value::Uint(u) => PathSegment::Index(u as usize),
                Value::String(k) => PathSegment::Key(k),
                other => {
                    return Err(Error::new(format!("invalid index {other}")));
                }
            };
            query::select(&base_value, &seg, false).ok_or_else(|| not_found(expr))
        }
        Expr::Call { callee, args } => {
            if let Expr::Ident(name) = callee.as_ref() {
                if name == "defined" && env.types().function(name).is_none() {
                    let [arg] = args.as_slice() else {
                        return Err(Error::new("defined takes exactly one argument"));
                    };
                    return Ok(Value::Bool(eval(arg, env).is_ok()));
                }
            }
            let f = match eval(callee, env)? {
                Value::Func(f) => f,
                other => {
                    let name = callee.path_text().unwrap_or_else(|| other.to_string());
                    return Err(Error::new(format!("{name} is not a function")));
                }
            };
            let args = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<Vec<_>, _>>()?;
            f.call(args, env.types())
        }
        Expr::Unary { op, expr } => {
            let v = eval(expr, env)?;
            match op {
                UnaryOp::Neg => v.neg().map_err(value_err),
                UnaryOp::Not => match v {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(Error::new(format!("operator ! not defined for {}", other.kind_name()))),
                },
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, env),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => match eval(cond, env)? {
            Value::Bool(true) => eval(then, env),
            Value::Bool(false) => eval(otherwise, env),
            other => Err(Error::new(format!(
                "condition must be bool but got {}",
                other.kind_name()
            ))),
        },
        Expr::LeftArrow { callee } => Err(Error::new(format!(
            "left arrow function {} must be used as a mapping key",
            callee.path_text().unwrap_or_default()
        ))),
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, env: &Env) -> Result<Value, Error> {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let l = as_bool(op, eval(left, env)?)?;
        if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
            return Ok(Value::Bool(l));
        }
        return Ok(Value::Bool(as_bool(op, eval(right, env)?)?));
    }

    let l = eval(left, env)?;
    let r = eval(right, env)?;
    match op {
        BinaryOp::Add => l.add(&r).map_err(value_err),
        BinaryOp::Sub => l.sub(&r).map_err(value_err),
        BinaryOp::Mul => l.mul(&r).map_err(value_err),
        BinaryOp::Div => l.div(&r).map_err(value_err),
        BinaryOp::Rem => l.rem(&r).map_err(value_err),
        BinaryOp::Eq | BinaryOp::NotEq => {
            let eq = match l.equal(&r) {
                Ok(eq) => eq,
                Err(e) if e.is_not_defined() => false,
                Err(e) => return Err(value_err(e)),
            };
            Ok(Value::Bool(if op == BinaryOp::Eq { eq } else { !eq }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = l.compare(&r).map_err(|_| {
                Error::new(format!(
                    "operator {} not defined for {} and {}",
                    op.symbol(),
                    l.kind_name(),
                    r.kind_name()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinaryOp::And => Ok(Value::Bool(as_bool(op, l)? && as_bool(op, r)?)),
        BinaryOp::Or => Ok(Value::Bool(as_bool(op, l)? || as_bool(op, r)?)),
    }
}

fn as_bool(op: BinaryOp, v: Value) -> Result<bool, Error> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(Error::new(format!(
            "operator {} not defined for {}",
            op.symbol(),
            other.kind_name()
        ))),
    }
}
