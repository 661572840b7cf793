//! Plugins: named symbols for templates plus optional setup hooks.
//!
//! Plugins are resolved through a [`PluginLoader`]. The bundled
//! [`StaticLoader`] serves plugins registered in-process at start-up; the
//! [`PluginCache`] makes opening the same source idempotent.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use scenaria_core::error::{Error, ErrorPhase};
use scenaria_core::ordered_map::OrderedMap;
use scenaria_core::value::{HostObject, Value};
use tracing::debug;

use crate::context::Context;

/// Undoes a setup. Runs with the final context of the scope it was set up for.
pub type Teardown = Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<(), Error>> + Send>;

/// Prepares a context, optionally returning the matching teardown.
pub type SetupFn =
    Arc<dyn Fn(Context) -> BoxFuture<'static, Result<(Context, Option<Teardown>), Error>> + Send + Sync>;

pub trait Plugin: Send + Sync {
    /// Exported variable or function named `name`.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Runs once before all scenarios.
    fn setup(&self) -> Option<SetupFn> {
        None
    }

    /// Runs before each scenario that uses the plugin.
    fn setup_each_scenario(&self) -> Option<SetupFn> {
        None
    }
}

/// A plugin as seen by templates: `plugins.<name>.<symbol>`.
#[derive(Clone)]
pub struct PluginObject {
    name: String,
    plugin: Arc<dyn Plugin>,
}

impl PluginObject {
    pub fn new(name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        Self {
            name: name.into(),
            plugin,
        }
    }
}

impl fmt::Debug for PluginObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginObject").field("name", &self.name).finish()
    }
}

impl HostObject for PluginObject {
    fn type_name(&self) -> &str {
        "plugin"
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.plugin.lookup(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin {0:?} not found")]
    NotFound(String),
    #[error("failed to open plugin {path}: {message}")]
    Open { path: String, message: String },
}

/// Opens a plugin from its resolved source path.
pub trait PluginLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn Plugin>, PluginError>;
}

/// Serves plugins registered in-process, keyed by the file name of the
/// source (`my.so`, `my` and `./plugins/my.so` all resolve to `my`).
#[derive(Default)]
pub struct StaticLoader {
    plugins: Mutex<OrderedMap<String, Arc<dyn Plugin>>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.plugins.lock().insert(name.into(), plugin);
    }
}

impl PluginLoader for StaticLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn Plugin>, PluginError> {
        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.plugins
            .lock()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| PluginError::NotFound(path.display().to_string()))
    }
}

/// Process-wide cache of opened plugins keyed by absolute source path.
pub struct PluginCache {
    loader: Arc<dyn PluginLoader>,
    opened: Mutex<OrderedMap<PathBuf, Arc<dyn Plugin>>>,
}

impl PluginCache {
    pub fn new(loader: Arc<dyn PluginLoader>) -> Self {
        Self {
            loader,
            opened: Mutex::new(OrderedMap::new()),
        }
    }

    /// Opens `src` relative to `dir`. Opening the same path twice returns the
    /// same plugin.
    pub fn open(&self, dir: &Path, src: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        let path = absolute(&dir.join(src));
        let mut opened = self.opened.lock();
        if let Some(p) = opened.get(&path) {
            return Ok(p.clone());
        }
        debug!(path = %path.display(), "opening plugin");
        let plugin = self.loader.open(&path)?;
        opened.insert(path, plugin.clone());
        Ok(plugin)
    }

    /// Opened plugins in the order they were first opened.
    pub fn opened(&self) -> Vec<(PathBuf, Arc<dyn Plugin>)> {
        self.opened
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Runs `setups` in order, threading the context through. On failure, the
/// teardowns of the setups that ran are returned with the error so the caller
/// can still run them.
pub async fn run_setups(
    mut ctx: Context,
    setups: Vec<(String, SetupFn)>,
) -> (Context, Vec<(String, Teardown)>, Option<Error>) {
    let mut teardowns = Vec::new();
    for (name, setup) in setups {
        match setup(ctx.clone()).await {
            Ok((next, teardown)) => {
                ctx = next;
                if let Some(t) = teardown {
                    teardowns.push((name, t));
                }
            }
            Err(e) => {
                let e = e.wrap(&format!("setup of plugin {name} failed")).with_phase(ErrorPhase::Setup);
                return (ctx, teardowns, Some(e));
            }
        }
    }
    (ctx, teardowns, None)
}

/// Runs teardowns in reverse registration order, collecting every failure.
pub async fn run_teardowns(ctx: &Context, teardowns: Vec<(String, Teardown)>) -> Result<(), Error> {
    let mut errors = Vec::new();
    for (name, teardown) in teardowns.into_iter().rev() {
        if let Err(e) = teardown(ctx.clone()).await {
            errors.push(
                e.wrap(&format!("teardown of plugin {name} failed"))
                    .with_phase(ErrorPhase::Teardown),
            );
        }
    }
    Error::collect(errors)
}
