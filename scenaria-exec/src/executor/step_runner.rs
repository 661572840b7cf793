use std::sync::Arc;
use std::time::Duration;

use scenaria_core::error::{Error, ErrorPhase};
use scenaria_core::scenario::{parse_file, Scenario, Step};
use scenaria_core::value::{Map, Value};
use tokio::task::JoinError;
use tracing::debug;

use crate::context::Context;
use crate::executor::failure::render_error;
use crate::executor::result::{StepRecord, StepStatus};
use crate::executor::scheduler::{record, Executor, Slot};
use crate::protocol::{AssertionBuilder, Invoker};
use crate::reporter::{Abort, TestResult};
use crate::retry::{decide_retry, RetryConfig, RetryDecision};

/// How long a timed-out step may keep running before it is abandoned.
pub const DEFAULT_POST_TIMEOUT_WAITING_LIMIT: Duration = Duration::from_secs(10);

struct Prepared {
    ctx: Context,
    invoker: Arc<dyn Invoker>,
    expect: Arc<dyn AssertionBuilder>,
}

/// A failed attempt. `ctx` is set once the invocation returned.
struct Failure {
    error: Error,
    ctx: Option<Context>,
    abandoned: bool,
}

impl Failure {
    fn new(error: Error, ctx: Option<Context>) -> Self {
        Self {
            error,
            ctx,
            abandoned: false,
        }
    }
}

impl Executor {
    /// Runs step `index` of `scenario` in the reporter node of `ctx`. The
    /// returned context is the scenario context plus bound variables and the
    /// step's result.
    pub(crate) async fn run_step(
        &self,
        ctx: Context,
        scenario: Arc<Scenario>,
        index: usize,
    ) -> (Context, TestResult) {
        let step = &scenario.steps[index];
        if let Some(include) = &step.include {
            return self.run_include(ctx, &scenario, index, include).await;
        }

        let reporter = ctx.reporter().clone();
        let colored = ctx.colored();
        let path = format!("steps[{index}]");
        let report = |err: Error| {
            let err = err.with_path_prefix(&path);
            reporter.error(render_error(&err, Some(&scenario), colored));
        };

        let prepared = match self.prepare(&ctx, step) {
            Ok(p) => p,
            Err(e) => {
                report(e);
                return (failed(ctx, step, None), Err(Abort));
            }
        };

        let retry = step
            .retry
            .as_ref()
            .map(RetryConfig::from)
            .unwrap_or_else(RetryConfig::none);
        let mut attempt_no = 1;
        let outcome = loop {
            let failure = match self.attempt(&prepared, step).await {
                Ok(done) => break Ok(done),
                Err(f) if f.abandoned => break Err(f),
                Err(f) => f,
            };
            match decide_retry(&retry, attempt_no, failure.error.phase(), || fastrand::u64(..)) {
                RetryDecision::RetryAfter { delay, .. } => {
                    debug!(step = %reporter.name(), attempt = attempt_no, ?delay, "retrying step");
                    reporter.log(format!(
                        "attempt {attempt_no} failed, retrying after {delay:?}: {}",
                        failure.error.clone().with_path_prefix(&path)
                    ));
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancel_token().cancelled() => break Err(failure),
                    }
                    attempt_no += 1;
                }
                RetryDecision::Stop { .. } => break Err(failure),
            }
        };

        let done = match outcome {
            Ok(done) => done,
            Err(f) => {
                report(f.error);
                if f.abandoned {
                    reporter.error("step hasn't finished despite the context canceled");
                }
                return (failed(ctx, step, f.ctx.as_ref()), Err(Abort));
            }
        };

        let mut next = ctx;
        if let Some(bind) = step.bind.as_ref().filter(|b| !b.vars.is_empty()) {
            match done.execute(&Value::Map(bind.vars.clone())) {
                Ok(vars) => next = next.with_vars(vars),
                Err(e) => {
                    report(e.with_path_prefix("bind.vars"));
                    return (failed(next, step, Some(&done)), Err(Abort));
                }
            }
        }
        let rec = StepRecord {
            request: done.request().cloned(),
            response: done.response().cloned(),
            ..StepRecord::new(StepStatus::Passed)
        };
        (record(next, &step.id, rec), Ok(()))
    }

    /// Renders step variables and resolves the protocol. Nothing here is retried.
    fn prepare(&self, ctx: &Context, step: &Step) -> Result<Prepared, Error> {
        let mut ctx = ctx.clone();
        if !step.vars.is_empty() {
            let vars = ctx
                .execute(&Value::Map(step.vars.clone()))
                .map_err(|e| e.with_path_prefix("vars"))?;
            ctx = ctx.with_vars(vars);
        }
        let protocol = self.protocols().get(&step.protocol).ok_or_else(|| {
            Error::at("protocol", format!("unknown protocol {:?}", step.protocol))
                .with_phase(ErrorPhase::Parse)
        })?;
        let invoker = protocol
            .unmarshal_request(step.request.as_ref().unwrap_or(&Value::Nil))
            .map_err(|e| e.with_path_prefix("request"))?;
        let expect = protocol
            .unmarshal_expect(step.expect.as_ref().unwrap_or(&Value::Nil))
            .map_err(|e| e.with_path_prefix("expect"))?;
        Ok(Prepared {
            ctx,
            invoker: Arc::from(invoker),
            expect: Arc::from(expect),
        })
    }

    /// One invocation under the step timeout. On expiry the attempt's context
    /// is canceled and the task gets the post-timeout waiting limit to finish;
    /// after that it is abandoned and drained in the background.
    async fn attempt(&self, prepared: &Prepared, step: &Step) -> Result<Context, Failure> {
        let cancel = prepared.ctx.cancel_token().child_token();
        let ctx = prepared.ctx.with_cancel(cancel.clone());
        let invoker = prepared.invoker.clone();
        let expect = prepared.expect.clone();
        let mut handle = tokio::spawn(invoke_and_assert(ctx, invoker, expect));

        let Some(timeout) = step.timeout else {
            return joined(handle.await);
        };
        if let Ok(result) = tokio::time::timeout(timeout, &mut handle).await {
            return joined(result);
        }

        cancel.cancel();
        let mut failure = Failure::new(
            Error::at("timeout", "timeout exceeded").with_phase(ErrorPhase::Timeout),
            None,
        );
        let limit = step
            .post_timeout_waiting_limit
            .unwrap_or(DEFAULT_POST_TIMEOUT_WAITING_LIMIT);
        if tokio::time::timeout(limit, &mut handle).await.is_err() {
            tokio::spawn(async move {
                let _ = handle.await;
            });
            failure.abandoned = true;
        }
        Err(failure)
    }

    async fn run_include(
        &self,
        ctx: Context,
        scenario: &Scenario,
        index: usize,
        include: &str,
    ) -> (Context, TestResult) {
        let step = &scenario.steps[index];
        let reporter = ctx.reporter().clone();
        let file = ctx.scenario_dir().join(include);
        let scenarios = match parse_file(&file) {
            Ok(s) => s,
            Err(e) => {
                let err = Error::at(format!("steps[{index}].include"), format!("failed to include: {e}"))
                    .with_phase(ErrorPhase::Parse);
                reporter.error(render_error(&err, Some(scenario), ctx.colored()));
                return (failed(ctx, step, None), Err(Abort));
            }
        };

        let mut steps = Map::new();
        for included in scenarios {
            let included = Arc::new(included);
            let slot: Slot<Context> = Slot::default();
            let out = slot.clone();
            let exec = self.clone();
            let base = ctx.with_steps(Map::new());
            reporter
                .run(&included.display_name(), move |r| async move {
                    let (next, result) = exec.run_scenario(base.with_reporter(r), included).await;
                    *out.lock() = Some(next);
                    result
                })
                .await;
            let taken = slot.lock().take();
            if let Some(next) = taken {
                for (id, result) in next.steps() {
                    steps.insert(id.clone(), result.clone());
                }
            }
        }

        let status = if reporter.failed() {
            StepStatus::Failed
        } else {
            StepStatus::Passed
        };
        let rec = StepRecord {
            steps: Some(steps),
            ..StepRecord::new(status)
        };
        let result = if status == StepStatus::Failed {
            Err(Abort)
        } else {
            Ok(())
        };
        (record(ctx, &step.id, rec), result)
    }
}

async fn invoke_and_assert(
    ctx: Context,
    invoker: Arc<dyn Invoker>,
    expect: Arc<dyn AssertionBuilder>,
) -> Result<Context, Failure> {
    let (next, response) = invoker.invoke(&ctx).await.map_err(|e| {
        Failure::new(
            e.with_path_prefix("request").with_phase(ErrorPhase::Invoke),
            None,
        )
    })?;
    log_exchange(&next);
    let assertion = expect.build(&next).map_err(|e| {
        Failure::new(
            e.with_path_prefix("expect").with_phase(ErrorPhase::Render),
            Some(next.clone()),
        )
    })?;
    if let Err(e) = assertion.assert(&response) {
        return Err(Failure::new(e.with_path_prefix("expect"), Some(next)));
    }
    Ok(next)
}

fn joined(result: Result<Result<Context, Failure>, JoinError>) -> Result<Context, Failure> {
    match result {
        Ok(r) => r,
        Err(e) => Err(Failure::new(Error::new(format!("step task failed: {e}")), None)),
    }
}

fn log_exchange(ctx: &Context) {
    for (label, value) in [("request", ctx.request()), ("response", ctx.response())] {
        let Some(value) = value else { continue };
        let text = serde_yaml::to_string(value).unwrap_or_else(|e| e.to_string());
        let body: Vec<String> = text.lines().map(|l| format!("  {l}")).collect();
        ctx.reporter().log(format!("{label}:\n{}", body.join("\n")));
    }
}

fn failed(ctx: Context, step: &Step, exchange: Option<&Context>) -> Context {
    let rec = StepRecord {
        request: exchange.and_then(|c| c.request().cloned()),
        response: exchange.and_then(|c| c.response().cloned()),
        ..StepRecord::new(StepStatus::Failed)
    };
    record(ctx, &step.id, rec)
}
