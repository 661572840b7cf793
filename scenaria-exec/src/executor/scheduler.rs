use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use scenaria_core::error::{Error, ErrorPhase};
use scenaria_core::scenario::Scenario;
use scenaria_core::value::Value;
use tracing::debug;

use crate::context::Context;
use crate::executor::failure::render_error;
use crate::executor::result::{StepRecord, StepStatus};
use crate::plugin::{run_setups, run_teardowns, PluginCache, Teardown};
use crate::protocol::ProtocolRegistry;
use crate::reporter::{Abort, TestResult};

/// Carries a value out of a child test body.
pub(crate) type Slot<T> = Arc<Mutex<Option<T>>>;

/// Runs scenarios step by step against the registered protocols.
#[derive(Clone)]
pub struct Executor {
    protocols: Arc<ProtocolRegistry>,
    plugins: Arc<PluginCache>,
}

impl Executor {
    pub fn new(protocols: Arc<ProtocolRegistry>, plugins: Arc<PluginCache>) -> Self {
        Self { protocols, plugins }
    }

    pub fn protocols(&self) -> &ProtocolRegistry {
        &self.protocols
    }

    pub fn plugins(&self) -> &Arc<PluginCache> {
        &self.plugins
    }

    /// Runs `scenario` in the reporter node of `ctx` and returns the final
    /// scenario context, whose `steps` hold every step result.
    pub fn run_scenario(
        &self,
        ctx: Context,
        scenario: Arc<Scenario>,
    ) -> BoxFuture<'static, (Context, TestResult)> {
        let exec = self.clone();
        Box::pin(async move { exec.scenario(ctx, scenario).await })
    }

    async fn scenario(&self, ctx: Context, scenario: Arc<Scenario>) -> (Context, TestResult) {
        let reporter = ctx.reporter().clone();
        let colored = ctx.colored();
        let mut ctx = ctx.with_scenario(scenario.clone());
        debug!(scenario = %scenario.display_name(), file = %scenario.filepath.display(), "running scenario");

        let fatal = |err: Error| reporter.fatal(render_error(&err, Some(&scenario), colored));

        let mut setups = Vec::new();
        for (name, src) in &scenario.plugins {
            match self.plugins.open(ctx.plugin_dir(), src) {
                Ok(plugin) => {
                    if let Some(setup) = plugin.setup_each_scenario() {
                        setups.push((name.clone(), setup));
                    }
                    ctx = ctx.with_plugin(name, plugin);
                }
                Err(e) => {
                    let err = Error::new(e.to_string())
                        .with_key(name)
                        .with_path_prefix("plugins")
                        .with_phase(ErrorPhase::Setup);
                    return (ctx, Err(fatal(err)));
                }
            }
        }

        if !scenario.vars.is_empty() {
            match ctx.execute(&Value::Map(scenario.vars.clone())) {
                Ok(vars) => ctx = ctx.with_vars(vars),
                Err(e) => return (ctx, Err(fatal(e.with_path_prefix("vars")))),
            }
        }
        if !scenario.secrets.is_empty() {
            match ctx.execute(&Value::Map(scenario.secrets.clone())) {
                Ok(secrets) => ctx = ctx.with_secrets(secrets),
                Err(e) => return (ctx, Err(fatal(e.with_path_prefix("secrets")))),
            }
        }

        let mut teardowns = Vec::new();
        if !setups.is_empty() {
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
            if let Some((next, registered)) = taken {
                ctx = next.with_reporter(reporter.clone());
                teardowns = registered;
            }
            if !passed {
                self.teardown(&ctx, teardowns).await;
                return (ctx, Err(reporter.fail_now()));
            }
        }

        let mut failed = false;
        for (i, step) in scenario.steps.iter().enumerate() {
            let slot: Slot<Context> = Slot::default();
            let out = slot.clone();
            let exec = self.clone();
            let base = ctx.clone();
            let sc = scenario.clone();
            let skip = failed;
            let passed = reporter
                .run(&step.display_name(i), move |r| async move {
                    let ctx = base.with_reporter(r.clone());
                    if skip {
                        let id = sc.steps[i].id.clone();
                        *out.lock() = Some(record(ctx, &id, StepRecord::new(StepStatus::Skipped)));
                        return Err(r.skip("skipped because a previous step failed"));
                    }
                    let (next, result) = exec.run_step(ctx, sc, i).await;
                    *out.lock() = Some(next);
                    result
                })
                .await;
            let taken = slot.lock().take();
            if let Some(next) = taken {
                ctx = next.with_reporter(reporter.clone());
            }
            if !passed && !step.continue_on_error {
                failed = true;
            }
        }

        self.teardown(&ctx, teardowns).await;
        let result = if reporter.failed() { Err(Abort) } else { Ok(()) };
        (ctx, result)
    }

    /// Runs `teardowns` newest first as a `teardown` child test.
    async fn teardown(&self, ctx: &Context, teardowns: Vec<(String, Teardown)>) {
        if teardowns.is_empty() {
            return;
        }
        let ctx = ctx.clone();
        ctx.reporter()
            .clone()
            .run("teardown", move |r| async move {
                match run_teardowns(&ctx.with_reporter(r.clone()), teardowns).await {
                    Ok(()) => Ok(()),
                    Err(e) => Err(r.fatal(e.to_string())),
                }
            })
            .await;
    }
}

/// Makes `rec` visible as `steps.<id>` when the step has an id.
pub(crate) fn record(ctx: Context, id: &str, rec: StepRecord) -> Context {
    if id.is_empty() {
        ctx
    } else {
        ctx.with_step_result(id, rec.to_value())
    }
}
