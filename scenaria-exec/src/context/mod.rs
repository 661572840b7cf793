//! Scenario execution context.
//!
//! A [`Context`] is immutable: every `with_*` returns a new copy and leaves
//! the old one valid for concurrent readers.

mod stack;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scenaria_core::assert;
use scenaria_core::error::Error;
use scenaria_core::scenario::Scenario;
use scenaria_core::template::{execute_value, Env, Lookup};
use scenaria_core::value::{EnvObject, Map, TypeRegistry, Value};
use tokio_util::sync::CancellationToken;

pub use stack::Stack;

use crate::plugin::{Plugin, PluginObject};
use crate::reporter::Reporter;
use crate::secrets::Redactor;
use stack::StackView;

#[derive(Clone)]
pub struct Context {
    cancel: CancellationToken,
    vars: Stack,
    secrets: Stack,
    redactor: Arc<Redactor>,
    plugins: Arc<Map>,
    steps: Arc<Map>,
    request: Option<Value>,
    response: Option<Value>,
    reporter: Reporter,
    scenario: Option<Arc<Scenario>>,
    plugin_dir: PathBuf,
    colored: bool,
    types: Arc<TypeRegistry>,
    assertions: Arc<Map>,
}

impl Context {
    pub fn new(reporter: Reporter) -> Self {
        let colored = reporter.options().colored;
        Self {
            cancel: CancellationToken::new(),
            vars: Stack::default(),
            secrets: Stack::default(),
            redactor: Arc::new(Redactor::new()),
            plugins: Arc::new(Map::new()),
            steps: Arc::new(Map::new()),
            request: None,
            response: None,
            reporter,
            scenario: None,
            plugin_dir: PathBuf::new(),
            colored,
            types: Arc::new(TypeRegistry::default()),
            assertions: Arc::new(assert::functions()),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    pub fn vars(&self) -> &Stack {
        &self.vars
    }

    /// Pushes a mapping of variables.
    pub fn with_vars(&self, vars: Value) -> Self {
        Self {
            vars: self.vars.push(vars),
            ..self.clone()
        }
    }

    pub fn secrets(&self) -> &Stack {
        &self.secrets
    }

    /// Pushes a mapping of secrets; every log line written from the new
    /// context has their rendered text redacted.
    pub fn with_secrets(&self, secrets: Value) -> Self {
        let redactor = Arc::new(self.redactor.with_secrets(&secrets));
        Self {
            secrets: self.secrets.push(secrets),
            reporter: self.reporter.with_redactor(redactor.clone()),
            redactor,
            ..self.clone()
        }
    }

    pub fn redact(&self, text: &str) -> String {
        self.redactor.redact(text)
    }

    pub fn with_plugin(&self, name: &str, plugin: Arc<dyn Plugin>) -> Self {
        let mut plugins = (*self.plugins).clone();
        plugins.insert(
            name.to_string(),
            Value::Object(Arc::new(PluginObject::new(name, plugin))),
        );
        Self {
            plugins: Arc::new(plugins),
            ..self.clone()
        }
    }

    pub fn steps(&self) -> &Map {
        &self.steps
    }

    /// Records the result of the step with `id` for later templates (`steps.<id>`).
    pub fn with_step_result(&self, id: &str, result: Value) -> Self {
        let mut steps = (*self.steps).clone();
        steps.insert(id.to_string(), result);
        self.with_steps(steps)
    }

    pub fn with_steps(&self, steps: Map) -> Self {
        Self {
            steps: Arc::new(steps),
            ..self.clone()
        }
    }

    pub fn request(&self) -> Option<&Value> {
        self.request.as_ref()
    }

    pub fn with_request(&self, request: Value) -> Self {
        Self {
            request: Some(request),
            ..self.clone()
        }
    }

    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn with_response(&self, response: Value) -> Self {
        Self {
            response: Some(response),
            ..self.clone()
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Switches to another reporter node, keeping this context's redaction.
    pub fn with_reporter(&self, reporter: Reporter) -> Self {
        Self {
            reporter: reporter.with_redactor(self.redactor.clone()),
            ..self.clone()
        }
    }

    pub fn scenario(&self) -> Option<&Arc<Scenario>> {
        self.scenario.as_ref()
    }

    pub fn with_scenario(&self, scenario: Arc<Scenario>) -> Self {
        Self {
            scenario: Some(scenario),
            ..self.clone()
        }
    }

    /// Directory of the running scenario file, used to resolve includes.
    pub fn scenario_dir(&self) -> PathBuf {
        self.scenario
            .as_ref()
            .and_then(|s| s.filepath.parent().map(Path::to_path_buf))
            .unwrap_or_default()
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn with_plugin_dir(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: dir.into(),
            ..self.clone()
        }
    }

    pub fn colored(&self) -> bool {
        self.colored
    }

    pub fn with_colored(&self, colored: bool) -> Self {
        Self {
            colored,
            ..self.clone()
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn with_types(&self, types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            ..self.clone()
        }
    }

    /// Template environment over this context.
    pub fn env(&self) -> Env {
        Env::new(Arc::new(self.clone()))
            .with_types(self.types.clone())
            .with_cancel(self.cancel.clone())
    }

    /// Renders every template in `v` against this context.
    pub fn execute(&self, v: &Value) -> Result<Value, Error> {
        execute_value(v, &self.env())
    }
}

impl Lookup for Context {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "vars" => Some(Value::Object(Arc::new(StackView {
                name: "vars",
                stack: self.vars.clone(),
            }))),
            "secrets" => Some(Value::Object(Arc::new(StackView {
                name: "secrets",
                stack: self.secrets.clone(),
            }))),
            "plugins" => Some(Value::Map((*self.plugins).clone())),
            "steps" => Some(Value::Map((*self.steps).clone())),
            "request" => self.request.clone(),
            "response" => self.response.clone(),
            "env" => Some(Value::Object(Arc::new(EnvObject))),
            "assert" => Some(Value::Map((*self.assertions).clone())),
            other => self
                .assertions
                .get(other)
                .or_else(|| self.plugins.get(other))
                .cloned(),
        }
    }
}
