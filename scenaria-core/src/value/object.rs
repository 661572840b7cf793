use std::fmt;

use super::{Signature, Value};

/// A host value navigable by field name and callable by method name.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn field(&self, name: &str) -> Option<Value>;

    fn field_ignore_case(&self, name: &str) -> Option<Value> {
        self.field(name)
    }

    fn method_signature(&self, _name: &str) -> Option<Signature> {
        None
    }

    fn call_method(&self, name: &str, _args: Vec<Value>) -> Result<Value, String> {
        Err(format!("{}.{name} is not a method", self.type_name()))
    }

    /// Symbolic name for enum-like values, compared against expected strings.
    fn enum_name(&self) -> Option<String> {
        None
    }

    /// Plain data view used for serialization and equality.
    fn to_value(&self) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: String,
    pub yaml: Option<String>,
    pub json: Option<String>,
    pub value: Value,
}

impl RecordField {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            yaml: None,
            json: None,
            value: value.into(),
        }
    }

    pub fn yaml(mut self, tag: impl Into<String>) -> Self {
        self.yaml = Some(tag.into());
        self
    }

    pub fn json(mut self, tag: impl Into<String>) -> Self {
        self.json = Some(tag.into());
        self
    }

    /// The first non-empty tag, or the field name when untagged.
    pub fn key(&self) -> &str {
        [self.yaml.as_deref(), self.json.as_deref()]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
            .unwrap_or(self.name.as_str())
    }
}

/// A struct-like object with tagged fields.
#[derive(Debug, Clone)]
pub struct Record {
    type_name: String,
    fields: Vec<RecordField>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: RecordField) -> Self {
        self.fields.push(field);
        self
    }
}

impl HostObject for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|f| f.key() == name)
            .map(|f| f.value.clone())
    }

    fn field_ignore_case(&self, name: &str) -> Option<Value> {
        self.field(name).or_else(|| {
            self.fields
                .iter()
                .find(|f| f.key().eq_ignore_ascii_case(name))
                .map(|f| f.value.clone())
        })
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Map(
            self.fields
                .iter()
                .map(|f| (f.key().to_string(), f.value.clone()))
                .collect(),
        ))
    }
}

/// Host process environment; unknown variables don't resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvObject;

impl HostObject for EnvObject {
    fn type_name(&self) -> &str {
        "env"
    }

    fn field(&self, name: &str) -> Option<Value> {
        std::env::var(name).ok().map(Value::String)
    }
}
