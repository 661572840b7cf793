//! Protocols turn a step's `request` into an invocation and its `expect` into
//! an assertion over the reply.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use scenaria_core::assert::Assertion;
use scenaria_core::error::Error;
use scenaria_core::ordered_map::OrderedMap;
use scenaria_core::value::Value;

use crate::context::Context;

/// Sends one request. The returned context carries `request` and `response`
/// so later templates can see the exchange.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, ctx: &Context) -> Result<(Context, Value), Error>;
}

/// Renders the expected document against the post-invocation context.
pub trait AssertionBuilder: Send + Sync {
    fn build(&self, ctx: &Context) -> Result<Assertion, Error>;
}

pub trait Protocol: Send + Sync {
    fn name(&self) -> &str;

    fn unmarshal_request(&self, raw: &Value) -> Result<Box<dyn Invoker>, Error>;

    fn unmarshal_expect(&self, raw: &Value) -> Result<Box<dyn AssertionBuilder>, Error>;
}

/// Protocols by name. Filled during start-up and read-only afterwards.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    protocols: OrderedMap<String, Arc<dyn Protocol>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `http` protocol.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(http::HttpProtocol::new()));
        registry
    }

    /// Adds `protocol`, replacing any protocol of the same name.
    pub fn register(&mut self, protocol: Arc<dyn Protocol>) {
        self.protocols.insert(protocol.name().to_string(), protocol);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Protocol>> {
        self.protocols.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.protocols.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}
