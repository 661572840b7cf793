//! Dotted/indexed path navigation over values.

use std::fmt;

use crate::error::{key_segment, parse_path, Error, PathSegment};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    segments: Vec<PathSegment>,
    case_insensitive: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `.a.b[3].c` (a leading dot is optional).
    pub fn parse(path: &str) -> Result<Self, Error> {
        let segments =
            parse_path(path).ok_or_else(|| Error::new(format!("invalid query path {path:?}")))?;
        Ok(Self {
            segments,
            case_insensitive: false,
        })
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn extract(&self, root: &Value) -> Result<Value, Error> {
        let mut current = root.clone();
        for (i, seg) in self.segments.iter().enumerate() {
            current = select(&current, seg, self.case_insensitive)
                .ok_or_else(|| self.not_found(i))?;
        }
        Ok(current)
    }

    /// Replaces the value at this path. Every intermediate node must already exist.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), Error> {
        let Some((last, parents)) = self.segments.split_last() else {
            *root = value;
            return Ok(());
        };
        let mut current = root;
        for (i, seg) in parents.iter().enumerate() {
            current = select_mut(current, seg, self.case_insensitive)
                .ok_or_else(|| self.not_found(i))?;
        }
        match (current, last) {
            (Value::Map(m), PathSegment::Key(k)) => {
                m.insert(k.clone(), value);
                Ok(())
            }
            (Value::Seq(items), PathSegment::Index(i)) if *i < items.len() => {
                items[*i] = value;
                Ok(())
            }
            _ => Err(self.not_found(self.segments.len() - 1)),
        }
    }

    fn not_found(&self, upto: usize) -> Error {
        let prefix = Query {
            segments: self.segments[..=upto].to_vec(),
            case_insensitive: self.case_insensitive,
        };
        Error::new(format!("path \"{prefix}\" not found"))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                PathSegment::Key(k) => f.write_str(&key_segment(k))?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

pub fn select(v: &Value, seg: &PathSegment, case_insensitive: bool) -> Option<Value> {
    match (v, seg) {
        (Value::Map(m), PathSegment::Key(k)) => {
            if case_insensitive {
                m.get_ignore_ascii_case(k).cloned()
            } else {
                m.get(k.as_str()).cloned()
            }
        }
        (Value::Seq(items), PathSegment::Index(i)) => items.get(*i).cloned(),
        (Value::Object(o), PathSegment::Key(k)) => {
            if case_insensitive {
                o.field_ignore_case(k)
            } else {
                o.field(k)
            }
        }
        (Value::Object(o), PathSegment::Index(_)) => {
            o.to_value().and_then(|inner| select(&inner, seg, case_insensitive))
        }
        _ => None,
    }
}

fn select_mut<'a>(v: &'a mut Value, seg: &PathSegment, case_insensitive: bool) -> Option<&'a mut Value> {
    match (v, seg) {
        (Value::Map(m), PathSegment::Key(k)) => {
            if case_insensitive && !m.contains_key(k.as_str()) {
                let actual = m.keys().find(|key| key.eq_ignore_ascii_case(k))?.clone();
                m.get_mut(actual.as_str())
            } else {
                m.get_mut(k.as_str())
            }
        }
        (Value::Seq(items), PathSegment::Index(i)) => items.get_mut(*i),
        _ => None,
    }
}
