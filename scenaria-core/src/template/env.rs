use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::value::{Map, TypeRegistry, Value};

/// Resolves the root identifier of a template lookup (`vars`, `env`, ...).
pub trait Lookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Lookup for Map {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Evaluation environment for templates.
#[derive(Clone)]
pub struct Env {
    data: Arc<dyn Lookup>,
    types: Arc<TypeRegistry>,
    cancel: CancellationToken,
    dollar: Option<Arc<Value>>,
}

impl Env {
    pub fn new(data: Arc<dyn Lookup>) -> Self {
        Self {
            data,
            types: Arc::new(TypeRegistry::default()),
            cancel: CancellationToken::new(),
            dollar: None,
        }
    }

    pub fn with_types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = types;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dollar(mut self, actual: Value) -> Self {
        self.dollar = Some(Arc::new(actual));
        self
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.data.lookup(name)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn dollar(&self) -> Option<&Value> {
        self.dollar.as_deref()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("dollar", &self.dollar)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
