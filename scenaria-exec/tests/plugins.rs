mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::FakeProtocol;
use futures_util::FutureExt;
use parking_lot::Mutex;
use scenaria_core::error::Error;
use scenaria_core::value::{Map, Value};
use scenaria_exec::plugin::{SetupFn, Teardown};
use scenaria_exec::reporter::Outcome;
use scenaria_exec::{Config, Context, Engine, Plugin, PluginCache, PluginLoader, StaticLoader};

/// Records setup and teardown calls into a shared journal.
struct Recorder {
    name: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
    fail_setup: bool,
    process_wide: bool,
}

impl Recorder {
    fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail_setup: false,
            process_wide: false,
        }
    }

    fn hook(&self) -> SetupFn {
        let name = self.name;
        let journal = self.journal.clone();
        let fail = self.fail_setup;
        Arc::new(move |ctx: Context| {
            let journal = journal.clone();
            async move {
                journal.lock().push(format!("setup {name}"));
                if fail {
                    return Err(Error::new("boom"));
                }
                let mut vars = Map::new();
                vars.insert("fromSetup".into(), Value::from(format!("setup-{name}")));
                let teardown: Teardown = Box::new(move |ctx: Context| {
                    async move {
                        ctx.reporter().log(format!("teardown {name}"));
                        journal.lock().push(format!("teardown {name}"));
                        Ok(())
                    }
                    .boxed()
                });
                Ok((ctx.with_vars(Value::Map(vars)), Some(teardown)))
            }
            .boxed()
        })
    }
}

impl Plugin for Recorder {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "greeting" => Some(Value::from(format!("hello from {}", self.name))),
            _ => None,
        }
    }

    fn setup(&self) -> Option<SetupFn> {
        self.process_wide.then(|| self.hook())
    }

    fn setup_each_scenario(&self) -> Option<SetupFn> {
        (!self.process_wide).then(|| self.hook())
    }
}

fn loader(plugins: Vec<Recorder>) -> Arc<StaticLoader> {
    let loader = StaticLoader::new();
    for p in plugins {
        loader.register(p.name, Arc::new(p));
    }
    Arc::new(loader)
}

#[tokio::test]
async fn scenario_plugins_set_up_and_tear_down_in_reverse() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let file = common::write(
        dir.path(),
        "plugins.yaml",
        r#"
schemaVersion: scenario/v1
title: plugged
plugins:
  p: p.so
  q: q.so
steps:
- title: echo
  protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    body:
      from: '{{vars.fromSetup}}'
      greeting: '{{plugins.p.greeting}}'
      short: '{{q.greeting}}'
  expect:
    body:
      from: setup-q
      greeting: hello from p
      short: hello from q
"#,
    );
    let engine = common::engine(dir.path()).with_plugin_loader(loader(vec![
        Recorder::new("p", &journal),
        Recorder::new("q", &journal),
    ]));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(
        *journal.lock(),
        vec!["setup p", "setup q", "teardown q", "teardown p"]
    );
    let teardown = summary.report.find("plugins.yaml/plugged/teardown").unwrap();
    assert_eq!(teardown.logs, vec!["teardown q", "teardown p"]);
}

#[tokio::test]
async fn failed_setup_skips_steps_but_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let file = common::write(
        dir.path(),
        "setup.yaml",
        r#"
schemaVersion: scenario/v1
title: broken
plugins:
  p: p.so
  q: q.so
steps:
- protocol: fake
  request: {n: 1}
"#,
    );
    let failing = Recorder {
        fail_setup: true,
        ..Recorder::new("q", &journal)
    };
    let fake = FakeProtocol::default();
    let mut engine = common::engine(dir.path())
        .with_plugin_loader(loader(vec![Recorder::new("p", &journal), failing]));
    engine.register_protocol(Arc::new(fake.clone()));

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert_eq!(fake.calls(), 0);
    assert_eq!(*journal.lock(), vec!["setup p", "setup q", "teardown p"]);
    assert!(out.contains("setup of plugin q failed: boom"), "{out}");
    assert_eq!(
        summary.report.find("setup.yaml/broken/setup").unwrap().outcome,
        Outcome::Failed
    );
}

#[tokio::test]
async fn missing_plugin_fails_the_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let file = common::write(
        dir.path(),
        "missing.yaml",
        "schemaVersion: scenario/v1\ntitle: m\nplugins:\n  x: nope.so\nsteps:\n- protocol: fake\n  request: {}\n",
    );
    let engine = common::engine(dir.path());

    let (summary, out) = common::run(&engine, &[file]).await;
    assert!(!summary.passed, "{out}");
    assert!(out.contains("plugins.x: plugin"), "{out}");
    assert!(out.contains("not found"), "{out}");
}

#[tokio::test]
async fn config_plugins_set_up_once_per_run() {
    let dir = tempfile::tempdir().unwrap();
    common::echo_addr();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let step = r#"
schemaVersion: scenario/v1
title: uses-global
steps:
- protocol: http
  request:
    method: POST
    url: '{{env.TEST_ADDR}}/echo'
    body: {from: '{{vars.fromSetup}}'}
  expect:
    body: {from: setup-g}
"#;
    let a = common::write(dir.path(), "a.yaml", step);
    let b = common::write(dir.path(), "b.yaml", step);
    let config = Config::parse(
        "schemaVersion: config/v1\nplugins:\n  g: {src: g.so}\n",
        "scenaria.yaml",
        dir.path().to_path_buf(),
    )
    .unwrap();
    let global = Recorder {
        process_wide: true,
        ..Recorder::new("g", &journal)
    };
    let engine = Engine::new(config).with_plugin_loader(loader(vec![global]));

    let (summary, out) = common::run(&engine, &[a, b]).await;
    assert!(summary.passed, "{out}");
    assert_eq!(*journal.lock(), vec!["setup g", "teardown g"]);
    assert_eq!(summary.report.find("teardown").unwrap().logs, vec!["teardown g"]);
}

#[test]
fn cache_opens_each_source_once() {
    struct Counting {
        opens: AtomicUsize,
    }
    struct Nothing;
    impl Plugin for Nothing {
        fn lookup(&self, _: &str) -> Option<Value> {
            None
        }
    }
    impl PluginLoader for Counting {
        fn open(&self, _: &Path) -> Result<Arc<dyn Plugin>, scenaria_exec::plugin::PluginError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Nothing))
        }
    }

    let loader = Arc::new(Counting {
        opens: AtomicUsize::new(0),
    });
    let cache = PluginCache::new(loader.clone());
    let dir = Path::new("/plugins");
    let a = cache.open(dir, "a.so").unwrap();
    let again = cache.open(dir, "./a.so").unwrap();
    cache.open(dir, "b.so").unwrap();

    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(loader.opens.load(Ordering::SeqCst), 2);
    let paths: Vec<_> = cache.opened().into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("a.so"));
}
