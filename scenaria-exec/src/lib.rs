#![forbid(unsafe_code)]

//! Runtime for scenario-based API tests: the scheduler, the reporter tree,
//! protocols, plugins and configuration.

pub mod config;
pub mod context;
pub mod engine;
pub mod executor;
pub mod plugin;
pub mod protocol;
pub mod reporter;
pub mod retry;
pub mod secrets;

pub use crate::config::{Config, ConfigError};
pub use crate::context::Context;
pub use crate::engine::{display_path, Engine, EngineError, RunSummary};
pub use crate::executor::Executor;
pub use crate::plugin::{Plugin, PluginCache, PluginLoader, StaticLoader};
pub use crate::protocol::{AssertionBuilder, Invoker, Protocol, ProtocolRegistry};
pub use crate::reporter::{Options, Report, Reporter};
