//! Typed values flowing through templates, queries and assertions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeDelta};

use crate::assert::Assertion;
use crate::ordered_map::OrderedMap;
use crate::template::Lazy;

mod codec;
mod convert;
pub mod duration;
mod func;
mod object;
mod ops;
mod registry;

pub use codec::{decode, from_json, from_serialize, from_yaml, to_json};
pub use func::{Builtin, Callable, NativeFn, Signature, TemplateFunc};
pub use object::{EnvObject, HostObject, Record, RecordField};
pub use registry::{TypeDef, TypeRegistry};

pub type Map = OrderedMap<String, Value>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Time(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Seq(Vec<Value>),
    Map(Map),
    Func(Callable),
    Object(Arc<dyn HostObject>),
    Assertion(Assertion),
    Lazy(Lazy),
}

/// Scalar types known to the algebra; everything structured or opaque is `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Uint,
    Float,
    Bool,
    String,
    Bytes,
    Time,
    Duration,
    Nil,
    Any,
}

impl Type {
    pub const BUILTIN: [Type; 10] = [
        Type::Any,
        Type::Nil,
        Type::Int,
        Type::Uint,
        Type::Float,
        Type::Bool,
        Type::String,
        Type::Bytes,
        Type::Time,
        Type::Duration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Uint => "uint",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::String => "string",
            Type::Bytes => "bytes",
            Type::Time => "time",
            Type::Duration => "duration",
            Type::Nil => "nil",
            Type::Any => "any",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("operation {op} not defined for {operands}")]
    OperationNotDefined { op: String, operands: String },
    #[error("{0}")]
    Overflow(String),
    #[error("division by 0")]
    DivisionByZero,
    #[error("can't convert {value} to {to}{}", reason_suffix(.reason))]
    Conversion {
        value: String,
        to: String,
        reason: Option<String>,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl ValueError {
    pub(crate) fn not_defined(op: &str, operands: &[&Value]) -> Self {
        let operands = operands
            .iter()
            .map(|v| v.kind_name())
            .collect::<Vec<_>>()
            .join(" and ");
        ValueError::OperationNotDefined {
            op: op.to_string(),
            operands,
        }
    }

    pub(crate) fn conversion(value: &Value, to: Type, reason: Option<String>) -> Self {
        ValueError::Conversion {
            value: value.to_string(),
            to: to.name().to_string(),
            reason,
        }
    }

    pub fn is_not_defined(&self) -> bool {
        matches!(self, ValueError::OperationNotDefined { .. })
    }
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Nil => Type::Nil,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Uint(_) => Type::Uint,
            Value::Float(_) => Type::Float,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::Time(_) => Type::Time,
            Value::Duration(_) => Type::Duration,
            _ => Type::Any,
        }
    }

    /// Human readable kind, finer grained than [`Type`] for structured values.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Seq(_) => "sequence".to_string(),
            Value::Map(_) => "map".to_string(),
            Value::Func(c) => format!("func {}", c.name()),
            Value::Object(o) => o.type_name().to_string(),
            Value::Assertion(_) => "assertion".to_string(),
            Value::Lazy(_) => "lazy".to_string(),
            other => other.type_of().name().to_string(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    /// Text used when the value is interpolated into a larger string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Seq(_) | Value::Map(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
            }
            Value::Object(o) => match o.to_value() {
                Some(v) => v.to_text(),
                None => self.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Whether the value equals the zero value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(b) => !*b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Time(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            Value::Duration(d) => *d == TimeDelta::zero(),
            Value::Seq(s) => s.is_empty(),
            Value::Map(m) => m.is_empty(),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl From<Assertion> for Value {
    fn from(v: Assertion) -> Self {
        Value::Assertion(v)
    }
}

/// Structural identity, used by tests and map comparison. Semantic equality
/// with numeric coercion lives in [`Value::equal`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Uint(u) => write!(f, "Uint({u})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bytes(b) => write!(f, "Bytes({b:?})"),
            Value::Time(t) => write!(f, "Time({})", t.to_rfc3339()),
            Value::Duration(d) => write!(f, "Duration({})", duration::format(*d)),
            Value::Seq(s) => f.debug_list().entries(s).finish(),
            Value::Map(m) => fmt::Debug::fmt(m, f),
            Value::Func(c) => write!(f, "Func({})", c.name()),
            Value::Object(o) => write!(f, "Object({o:?})"),
            Value::Assertion(_) => f.write_str("Assertion"),
            Value::Lazy(l) => write!(f, "Lazy({})", l.source()),
        }
    }
}

/// Repr form: strings are quoted so messages like `expected "a" but got 1` read unambiguously.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "bytes({s:?})"),
                Err(_) => write!(f, "bytes({b:?})"),
            },
            Value::Time(t) => f.write_str(&convert::format_time(t)),
            Value::Duration(d) => f.write_str(&duration::format(*d)),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Func(c) => write!(f, "<func {}>", c.name()),
            Value::Object(o) => match o.enum_name() {
                Some(name) => f.write_str(&name),
                None => write!(f, "<{}>", o.type_name()),
            },
            Value::Assertion(_) => f.write_str("<assertion>"),
            Value::Lazy(l) => write!(f, "<lazy {}>", l.source()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_strings_only() {
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::from("hi").to_text(), "hi");
        assert_eq!(Value::Nil.to_text(), "");
    }

    #[test]
    fn structured_text_is_json() {
        let v = Value::Seq(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(v.to_text(), "[1,\"a\"]");
    }
}
