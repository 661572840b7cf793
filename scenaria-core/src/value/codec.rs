use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{convert::format_time, duration, Map, Value};
use crate::error::Error;

pub fn from_yaml(v: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match v {
        Y::Null => Value::Nil,
        Y::Bool(b) => Value::Bool(*b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Y::String(s) => Value::String(s.clone()),
        Y::Sequence(items) => Value::Seq(items.iter().map(from_yaml).collect()),
        Y::Mapping(m) => Value::Map(
            m.iter()
                .map(|(k, v)| (yaml_key_text(k), from_yaml(v)))
                .collect::<Map>(),
        ),
        Y::Tagged(t) => from_yaml(&t.value),
    }
}

/// Mapping keys become strings. A flow-mapping key with a single null entry
/// (`{fn <-}: ...`) keeps its braces so left-arrow keys survive parsing.
fn yaml_key_text(k: &serde_yaml::Value) -> String {
    use serde_yaml::Value as Y;
    match k {
        Y::String(s) => s.clone(),
        Y::Number(n) => n.to_string(),
        Y::Bool(b) => b.to_string(),
        Y::Null => "null".to_string(),
        Y::Mapping(m) if m.len() == 1 => match m.iter().next() {
            Some((inner, Y::Null)) => format!("{{{}}}", yaml_key_text(inner)),
            _ => yaml_fallback_text(k),
        },
        Y::Tagged(t) => yaml_key_text(&t.value),
        other => yaml_fallback_text(other),
    }
}

fn yaml_fallback_text(k: &serde_yaml::Value) -> String {
    serde_yaml::to_string(k)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

pub fn from_json(v: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    match v {
        J::Null => Value::Nil,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        J::String(s) => Value::String(s.clone()),
        J::Array(items) => Value::Seq(items.iter().map(from_json).collect()),
        J::Object(m) => Value::Map(
            m.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect::<Map>(),
        ),
    }
}

pub fn to_json(v: &Value) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}

/// Converts any serializable host value into a [`Value`] tree.
pub fn from_serialize<T: Serialize + ?Sized>(v: &T) -> Result<Value, Error> {
    serde_yaml::to_value(v)
        .map(|y| from_yaml(&y))
        .map_err(|e| Error::new(e.to_string()))
}

/// Deserializes a host type from its [`Value`] representation.
pub fn decode<T: DeserializeOwned>(v: &Value) -> Result<T, Error> {
    let yaml = serde_yaml::to_value(v).map_err(|e| Error::new(e.to_string()))?;
    serde_yaml::from_value(yaml).map_err(|e| Error::new(e.to_string()))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Uint(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => {
                    let mut seq = serializer.serialize_seq(Some(b.len()))?;
                    for byte in b {
                        seq.serialize_element(byte)?;
                    }
                    seq.end()
                }
            },
            Value::Time(t) => serializer.serialize_str(&format_time(t)),
            Value::Duration(d) => serializer.serialize_str(&duration::format(*d)),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Object(o) => match o.to_value() {
                Some(v) => v.serialize(serializer),
                None => serializer.serialize_str(&self.to_string()),
            },
            Value::Func(_) | Value::Assertion(_) | Value::Lazy(_) => {
                serializer.serialize_str(&self.to_string())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_yaml::Value::deserialize(deserializer).map(|v| from_yaml(&v))
    }
}
