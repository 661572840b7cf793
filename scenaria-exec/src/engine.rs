//! Application root: owns the protocol registry, the plugin cache and the type
//! registry, and runs scenario files under one reporter tree.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scenaria_core::error::{Error, ParseError};
use scenaria_core::scenario::{parse_file, Scenario};
use scenaria_core::value::{TypeRegistry, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::context::Context;
use crate::executor::{Executor, Slot};
use crate::plugin::{
    run_setups, run_teardowns, PluginCache, PluginError, PluginLoader, SetupFn, StaticLoader, Teardown,
};
use crate::protocol::http::HttpProtocol;
use crate::protocol::{Protocol, ProtocolRegistry};
use crate::reporter::{Options, Report, ReportError, Reporter};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error("failed to render {0}")]
    Render(Error),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub passed: bool,
    pub report: Report,
}

pub struct Engine {
    config: Config,
    options: Options,
    protocols: ProtocolRegistry,
    plugins: Arc<PluginCache>,
    types: Arc<TypeRegistry>,
    cancel: CancellationToken,
}

impl Engine {
    /// Engine with the built-in protocols and an empty in-process plugin table.
    pub fn new(config: Config) -> Self {
        let options = Options {
            verbose: config.output.verbose,
            colored: config.output.colored.unwrap_or(false),
            summary: config.output.summary,
        };
        let mut protocols = ProtocolRegistry::new();
        protocols.register(Arc::new(
            HttpProtocol::new().with_default_timeout(config.protocols.http.timeout),
        ));
        Self {
            config,
            options,
            protocols,
            plugins: Arc::new(PluginCache::new(Arc::new(StaticLoader::new()))),
            types: Arc::new(TypeRegistry::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_plugin_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.plugins = Arc::new(PluginCache::new(loader));
        self
    }

    pub fn with_types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = types;
        self
    }

    pub fn register_protocol(&mut self, protocol: Arc<dyn Protocol>) {
        self.protocols.register(protocol);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn plugins(&self) -> &Arc<PluginCache> {
        &self.plugins
    }

    /// Cancels every running scenario.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scenario files to run for `files` (or the configured scenarios).
    pub fn discover(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self.config.discover(files)?)
    }

    /// Parses every scenario file without running it.
    pub fn list(&self, files: &[PathBuf]) -> Result<Vec<(PathBuf, Vec<Scenario>)>, EngineError> {
        self.discover(files)?
            .into_iter()
            .map(|path| {
                let scenarios = parse_file(&path)?;
                Ok((path, scenarios))
            })
            .collect()
    }

    /// Runs the scenario files, printing results to stdout.
    pub async fn run(&self, files: &[PathBuf]) -> Result<RunSummary, EngineError> {
        self.run_with_writer(files, std::io::stdout()).await
    }

    pub async fn run_with_writer(
        &self,
        files: &[PathBuf],
        out: impl Write + Send + 'static,
    ) -> Result<RunSummary, EngineError> {
        let files = self.discover(files)?;
        let reporter = Reporter::with_writer(self.options, out);
        let (ctx, setups) = self.root_context(reporter.clone())?;
        info!(files = files.len(), "running scenarios");

        let (ctx, teardowns, ready) = self.setup(ctx, setups).await;
        if ready {
            let executor = Executor::new(Arc::new(self.protocols.clone()), self.plugins.clone());
            for file in files {
                self.run_file(&ctx, &executor, file).await;
            }
        }
        if !teardowns.is_empty() {
            reporter
                .run("teardown", move |r| async move {
                    match run_teardowns(&ctx.with_reporter(r.clone()), teardowns).await {
                        Ok(()) => Ok(()),
                        Err(e) => Err(r.fatal(e.to_string())),
                    }
                })
                .await;
        }

        let passed = reporter.wait().await;
        let report = reporter.report();
        if let Some(path) = self.config.json_report() {
            report.write_json(&path)?;
            debug!(path = %path.display(), "wrote JSON report");
        }
        if let Some(path) = self.config.junit_report() {
            report.write_junit(&path)?;
            debug!(path = %path.display(), "wrote JUnit report");
        }
        Ok(RunSummary { passed, report })
    }

    /// Context shared by every scenario: config vars and secrets plus the
    /// config-level plugins, whose process-wide setups are returned.
    fn root_context(
        &self,
        reporter: Reporter,
    ) -> Result<(Context, Vec<(String, SetupFn)>), EngineError> {
        let mut ctx = Context::new(reporter)
            .with_cancel(self.cancel.clone())
            .with_types(self.types.clone())
            .with_colored(self.options.colored)
            .with_plugin_dir(self.config.plugin_dir());

        let mut setups = Vec::new();
        for (name, plugin) in &self.config.plugins {
            let opened = self.plugins.open(ctx.plugin_dir(), &plugin.src)?;
            if let Some(setup) = opened.setup() {
                setups.push((name.clone(), setup));
            }
            ctx = ctx.with_plugin(name, opened);
        }
        if !self.config.vars.is_empty() {
            let vars = ctx
                .execute(&Value::Map(self.config.vars.clone()))
                .map_err(|e| EngineError::Render(e.with_path_prefix("vars")))?;
            ctx = ctx.with_vars(vars);
        }
        if !self.config.secrets.is_empty() {
            let secrets = ctx
                .execute(&Value::Map(self.config.secrets.clone()))
                .map_err(|e| EngineError::Render(e.with_path_prefix("secrets")))?;
            ctx = ctx.with_secrets(secrets);
        }
        Ok((ctx, setups))
    }

    /// Runs the process-wide plugin setups as a `setup` test. Returns whether
    /// scenarios may run.
    async fn setup(
        &self,
        ctx: Context,
        setups: Vec<(String, SetupFn)>,
    ) -> (Context, Vec<(String, Teardown)>, bool) {
        if setups.is_empty() {
            return (ctx, Vec::new(), true);
        }
        let reporter = ctx.reporter().clone();
        let slot: Slot<(Context, Vec<(String, Teardown)>)> = Slot::default();
        let out = slot.clone();
        let base = ctx.clone();
        let passed = reporter
            .run("setup", move |r| async move {
                let (next, teardowns, err) = run_setups(base.with_reporter(r.clone()), setups).await;
                *out.lock() = Some((next, teardowns));
                match err {
                    Some(e) => Err(r.fatal(e.to_string())),
                    None => Ok(()),
                }
            })
            .await;
        let taken = slot.lock().take();
        match taken {
            Some((next, teardowns)) => (next.with_reporter(reporter), teardowns, passed),
            None => (ctx, Vec::new(), false),
        }
    }

    /// Runs every scenario of `file` as children of one test named after the file.
    async fn run_file(&self, ctx: &Context, executor: &Executor, file: PathBuf) {
        let name = display_path(&file, &self.config.root);
        let ctx = ctx.clone();
        let executor = executor.clone();
        ctx.reporter()
            .clone()
            .run(&name, move |r| async move {
                let scenarios = match parse_file(&file) {
                    Ok(s) => s,
                    Err(e) => return Err(r.fatal(e.to_string())),
                };
                for scenario in scenarios {
                    let scenario = Arc::new(scenario);
                    let base = ctx.clone();
                    let executor = executor.clone();
                    r.run(&scenario.display_name(), move |r| async move {
                        let (_, result) = executor.run_scenario(base.with_reporter(r), scenario).await;
                        result
                    })
                    .await;
                }
                Ok(())
            })
            .await;
    }
}

/// `path` relative to `root` when it lives below it.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
