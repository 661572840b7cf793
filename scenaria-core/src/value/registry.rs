use std::fmt;
use std::sync::Arc;

use super::func::Builtin;
use super::{Callable, Type, Value};

type Matcher = dyn Fn(&Value) -> bool + Send + Sync;

/// A named type known to templates. Its name doubles as a conversion function.
#[derive(Clone)]
pub struct TypeDef {
    pub name: String,
    matches: Arc<Matcher>,
    convert: Callable,
}

impl TypeDef {
    pub fn new<F>(name: impl Into<String>, matches: F, convert: Callable) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matches: Arc::new(matches),
            convert,
        }
    }

    fn builtin(t: Type) -> Self {
        Self::new(
            t.name(),
            move |v| t != Type::Any && v.type_of() == t,
            Callable::Builtin(Builtin::Convert(t)),
        )
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef").field("name", &self.name).finish()
    }
}

/// Ordered type table; later registrations shadow earlier ones.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    defs: Vec<TypeDef>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self {
            defs: Type::BUILTIN.into_iter().map(TypeDef::builtin).collect(),
        }
    }
}

impl TypeRegistry {
    pub fn register(&mut self, def: TypeDef) {
        self.defs.push(def);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.defs.iter().rev().find(|d| d.name == name)
    }

    /// Name of the newest type that claims `v`, falling back to `any`.
    pub fn type_name(&self, v: &Value) -> String {
        self.defs
            .iter()
            .rev()
            .find(|d| (d.matches)(v))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| Type::Any.name().to_string())
    }

    /// Built-in functions: type conversions plus `type` and `size`.
    pub fn function(&self, name: &str) -> Option<Callable> {
        match name {
            "type" => Some(Callable::Builtin(Builtin::TypeOf)),
            "size" => Some(Callable::Builtin(Builtin::Size)),
            _ => self.get(name).map(|d| d.convert.clone()),
        }
    }
}
