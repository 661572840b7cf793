use std::cmp::Ordering;

use super::{Value, ValueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
            Arith::Rem => "%",
        }
    }
}

/// Operand pair after numeric promotion.
enum Numeric {
    Int(i64, i64),
    Uint(u64, u64),
    Mixed(i128, i128),
    Float(f64, f64),
}

fn promote(a: &Value, b: &Value) -> Option<Numeric> {
    Some(match (a, b) {
        (Value::Int(x), Value::Int(y)) => Numeric::Int(*x, *y),
        (Value::Uint(x), Value::Uint(y)) => Numeric::Uint(*x, *y),
        (Value::Int(x), Value::Uint(y)) => Numeric::Mixed(i128::from(*x), i128::from(*y)),
        (Value::Uint(x), Value::Int(y)) => Numeric::Mixed(i128::from(*x), i128::from(*y)),
        (Value::Float(x), Value::Float(y)) => Numeric::Float(*x, *y),
        (Value::Float(x), other) => Numeric::Float(*x, as_f64(other)?),
        (other, Value::Float(y)) => Numeric::Float(as_f64(other)?, *y),
        _ => return None,
    })
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Uint(u) => Some(*u as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn overflow(a: impl std::fmt::Display, op: Arith, b: impl std::fmt::Display, ty: &str) -> ValueError {
    ValueError::Overflow(format!("{a} {} {b} overflows {ty}", op.symbol()))
}

fn int_arith(op: Arith, x: i64, y: i64) -> Result<Value, ValueError> {
    if matches!(op, Arith::Div | Arith::Rem) && y == 0 {
        return Err(ValueError::DivisionByZero);
    }
    let r = match op {
        Arith::Add => x.checked_add(y),
        Arith::Sub => x.checked_sub(y),
        Arith::Mul => x.checked_mul(y),
        Arith::Div => x.checked_div(y),
        Arith::Rem => x.checked_rem(y),
    };
    r.map(Value::Int).ok_or_else(|| overflow(x, op, y, "int"))
}

fn uint_arith(op: Arith, x: u64, y: u64) -> Result<Value, ValueError> {
    if matches!(op, Arith::Div | Arith::Rem) && y == 0 {
        return Err(ValueError::DivisionByZero);
    }
    let r = match op {
        Arith::Add => x.checked_add(y),
        Arith::Sub => x.checked_sub(y),
        Arith::Mul => x.checked_mul(y),
        Arith::Div => x.checked_div(y),
        Arith::Rem => x.checked_rem(y),
    };
    r.map(Value::Uint).ok_or_else(|| overflow(x, op, y, "uint"))
}

fn mixed_arith(op: Arith, x: i128, y: i128) -> Result<Value, ValueError> {
    if matches!(op, Arith::Div | Arith::Rem) && y == 0 {
        return Err(ValueError::DivisionByZero);
    }
    let r = match op {
        Arith::Add => x.checked_add(y),
        Arith::Sub => x.checked_sub(y),
        Arith::Mul => x.checked_mul(y),
        Arith::Div => x.checked_div(y),
        Arith::Rem => x.checked_rem(y),
    };
    // int when it fits, uint above i64::MAX
    let r = r.and_then(|r| {
        i64::try_from(r)
            .map(Value::Int)
            .or_else(|_| u64::try_from(r).map(Value::Uint))
            .ok()
    });
    r.ok_or_else(|| overflow(x, op, y, "int"))
}

fn float_arith(op: Arith, x: f64, y: f64) -> Result<Value, ValueError> {
    match op {
        Arith::Add => Ok(Value::Float(x + y)),
        Arith::Sub => Ok(Value::Float(x - y)),
        Arith::Mul => Ok(Value::Float(x * y)),
        Arith::Div if y == 0.0 => Err(ValueError::DivisionByZero),
        Arith::Div => Ok(Value::Float(x / y)),
        Arith::Rem => Err(ValueError::not_defined(
            "%",
            &[&Value::Float(x), &Value::Float(y)],
        )),
    }
}

impl Value {
    fn arith(&self, op: Arith, other: &Value) -> Result<Value, ValueError> {
        if let Some(n) = promote(self, other) {
            return match n {
                Numeric::Int(x, y) => int_arith(op, x, y),
                Numeric::Uint(x, y) => uint_arith(op, x, y),
                Numeric::Mixed(x, y) => mixed_arith(op, x, y),
                Numeric::Float(x, y) => float_arith(op, x, y),
            };
        }
        let undefined = || ValueError::not_defined(op.symbol(), &[self, other]);
        match (op, self, other) {
            (Arith::Add, Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Arith::Add, Value::Bytes(a), Value::Bytes(b)) => {
                let mut out = a.clone();
                out.extend_from_slice(b);
                Ok(Value::Bytes(out))
            }
            (Arith::Add, Value::Time(t), Value::Duration(d))
            | (Arith::Add, Value::Duration(d), Value::Time(t)) => t
                .checked_add_signed(*d)
                .map(Value::Time)
                .ok_or_else(|| ValueError::Overflow(format!("{self} + {other} overflows time"))),
            (Arith::Sub, Value::Time(t), Value::Duration(d)) => t
                .checked_sub_signed(*d)
                .map(Value::Time)
                .ok_or_else(|| ValueError::Overflow(format!("{self} - {other} overflows time"))),
            (Arith::Sub, Value::Time(a), Value::Time(b)) => {
                Ok(Value::Duration(a.signed_duration_since(*b)))
            }
            (Arith::Add, Value::Duration(a), Value::Duration(b)) => a
                .checked_add(b)
                .map(Value::Duration)
                .ok_or_else(|| overflow(self, op, other, "duration")),
            (Arith::Sub, Value::Duration(a), Value::Duration(b)) => a
                .checked_sub(b)
                .map(Value::Duration)
                .ok_or_else(|| overflow(self, op, other, "duration")),
            _ => Err(undefined()),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        self.arith(Arith::Add, other)
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ValueError> {
        self.arith(Arith::Sub, other)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueError> {
        self.arith(Arith::Mul, other)
    }

    pub fn div(&self, other: &Value) -> Result<Value, ValueError> {
        self.arith(Arith::Div, other)
    }

    pub fn rem(&self, other: &Value) -> Result<Value, ValueError> {
        self.arith(Arith::Rem, other)
    }

    pub fn neg(&self) -> Result<Value, ValueError> {
        match self {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| ValueError::Overflow(format!("-{i} overflows int"))),
            Value::Uint(u) => i64::try_from(*u)
                .map(|i| Value::Int(-i))
                .map_err(|_| ValueError::Overflow(format!("-{u} overflows int"))),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Duration(d) => Ok(Value::Duration(-*d)),
            _ => Err(ValueError::not_defined("-", &[self])),
        }
    }

    /// Semantic equality: numbers compare by value across int, uint and float;
    /// sequences and maps compare element-wise. Mismatched kinds are
    /// `OperationNotDefined` so callers can decide what that means.
    pub fn equal(&self, other: &Value) -> Result<bool, ValueError> {
        if let Some(n) = promote(self, other) {
            return Ok(match n {
                Numeric::Int(x, y) => x == y,
                Numeric::Uint(x, y) => x == y,
                Numeric::Mixed(x, y) => x == y,
                Numeric::Float(x, y) => x == y,
            });
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => Ok(true),
            (Value::Nil, _) | (_, Value::Nil) => Ok(false),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a == b),
            (Value::String(a), Value::Bytes(b)) | (Value::Bytes(b), Value::String(a)) => {
                Ok(a.as_bytes() == b.as_slice())
            }
            (Value::Time(a), Value::Time(b)) => Ok(a == b),
            (Value::Duration(a), Value::Duration(b)) => Ok(a == b),
            (Value::Seq(a), Value::Seq(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.equal(y).unwrap_or(false) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, x) in a {
                    match b.get(k) {
                        Some(y) if x.equal(y).unwrap_or(false) => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Value::Object(a), Value::Object(b)) => {
                if std::sync::Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                match (a.to_value(), b.to_value()) {
                    (Some(x), Some(y)) => x.equal(&y),
                    _ => Err(ValueError::not_defined("==", &[self, other])),
                }
            }
            (Value::Object(o), Value::String(s)) | (Value::String(s), Value::Object(o)) => {
                match o.enum_name() {
                    Some(name) => Ok(&name == s),
                    None => match o.to_value() {
                        Some(v) => v.equal(&Value::String(s.clone())),
                        None => Err(ValueError::not_defined("==", &[self, other])),
                    },
                }
            }
            (Value::Object(o), v) | (v, Value::Object(o)) => match o.to_value() {
                Some(x) => x.equal(v),
                None => Err(ValueError::not_defined("==", &[self, other])),
            },
            _ => Err(ValueError::not_defined("==", &[self, other])),
        }
    }

    pub fn compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        let undefined = || ValueError::not_defined("<", &[self, other]);
        if let Some(n) = promote(self, other) {
            return match n {
                Numeric::Int(x, y) => Ok(x.cmp(&y)),
                Numeric::Uint(x, y) => Ok(x.cmp(&y)),
                Numeric::Mixed(x, y) => Ok(x.cmp(&y)),
                Numeric::Float(x, y) => x.partial_cmp(&y).ok_or_else(undefined),
            };
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Ok(a.cmp(b)),
            _ => Err(undefined()),
        }
    }

    /// Length of strings (in characters), bytes, sequences and maps.
    pub fn size(&self) -> Result<usize, ValueError> {
        match self {
            Value::String(s) => Ok(s.chars().count()),
            Value::Bytes(b) => Ok(b.len()),
            Value::Seq(s) => Ok(s.len()),
            Value::Map(m) => Ok(m.len()),
            Value::Object(o) => match o.to_value() {
                Some(v) => v.size(),
                None => Err(ValueError::not_defined("size", &[self])),
            },
            _ => Err(ValueError::not_defined("size", &[self])),
        }
    }
}
