//! Hierarchical test reporter.
//!
//! Every node is one test. Children run as separate tokio tasks; a child that
//! calls [`Reporter::parallel`] is paused until its parent's body returns and
//! then runs concurrently with its parallel siblings. Transcripts are buffered
//! per node and written parent-first in declaration order.

mod junit;
mod report;
mod writer;

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::secrets::Redactor;

pub use junit::write_junit;
pub use report::{Outcome, Report, ReportError};
pub use writer::MemoryWriter;

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Print transcripts of passing tests too.
    pub verbose: bool,
    pub colored: bool,
    /// Print a one-line pass/fail/skip count at the end.
    pub summary: bool,
}

/// Returned by [`Reporter::fatal`], [`Reporter::fail_now`] and
/// [`Reporter::skip`] to stop the current test body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

pub type TestResult = Result<(), Abort>;

struct Node {
    name: String,
    depth: usize,
    state: Mutex<State>,
    /// Fired when the node's body has returned; parallel children wait on it.
    release: CancellationToken,
    paused: Mutex<Option<oneshot::Sender<()>>>,
}

#[derive(Default)]
struct State {
    failed: bool,
    skipped: bool,
    done: bool,
    logs: Vec<String>,
    children: Vec<Arc<Node>>,
    names: HashMap<String, usize>,
    pending: Vec<JoinHandle<()>>,
    started: Option<Instant>,
    duration: Duration,
}

impl Node {
    fn new(name: String, depth: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            depth,
            state: Mutex::new(State {
                started: Some(Instant::now()),
                ..State::default()
            }),
            release: CancellationToken::new(),
            paused: Mutex::new(None),
        })
    }

    fn outcome(&self) -> Outcome {
        let state = self.state.lock();
        if state.failed {
            Outcome::Failed
        } else if state.skipped {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }
}

struct Shared {
    options: Options,
    out: Mutex<Box<dyn Write + Send>>,
    started: Instant,
    /// Number of root children already written.
    flushed: Mutex<usize>,
}

/// Handle to one node of the test tree.
#[derive(Clone)]
pub struct Reporter {
    node: Arc<Node>,
    parent: Option<Arc<Node>>,
    root: Arc<Node>,
    shared: Arc<Shared>,
    redactor: Arc<Redactor>,
}

impl Reporter {
    /// Creates the root of a test tree writing to stdout.
    pub fn new(options: Options) -> Self {
        Self::with_writer(options, std::io::stdout())
    }

    pub fn with_writer(options: Options, out: impl Write + Send + 'static) -> Self {
        let root = Node::new(String::new(), 0);
        Self {
            node: root.clone(),
            parent: None,
            root,
            shared: Arc::new(Shared {
                options,
                out: Mutex::new(Box::new(out)),
                started: Instant::now(),
                flushed: Mutex::new(0),
            }),
            redactor: Arc::new(Redactor::new()),
        }
    }

    /// Same node, with log lines passed through `redactor`.
    pub fn with_redactor(&self, redactor: Arc<Redactor>) -> Self {
        Self {
            redactor,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn options(&self) -> Options {
        self.shared.options
    }

    /// Runs `f` as a child test and waits for it, unless it calls
    /// [`Reporter::parallel`]. Returns whether the child passed (or `true` for
    /// a child still running in parallel).
    pub async fn run<F, Fut>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(Reporter) -> Fut + Send + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        let child = self.add_child(name);
        let (paused_tx, paused_rx) = oneshot::channel();
        *child.paused.lock() = Some(paused_tx);
        let reporter = Reporter {
            node: child.clone(),
            parent: Some(self.node.clone()),
            root: self.root.clone(),
            shared: self.shared.clone(),
            redactor: self.redactor.clone(),
        };
        debug!(test = %child.name, "run");

        let mut handle = tokio::spawn(async move {
            let body = tokio::spawn(f(reporter.clone()));
            if let Err(e) = body.await {
                if e.is_panic() {
                    reporter.error(format!("panic: {}", panic_message(e)));
                }
            }
            reporter.complete().await;
        });

        tokio::select! {
            _ = &mut handle => child.outcome() != Outcome::Failed,
            Ok(()) = paused_rx => {
                self.node.state.lock().pending.push(handle);
                true
            }
        }
    }

    /// Pauses until the parent's body has returned, then continues in
    /// parallel with the other parallel children of the same parent.
    pub async fn parallel(&self) {
        let Some(parent) = &self.parent else {
            return;
        };
        let Some(tx) = self.node.paused.lock().take() else {
            return;
        };
        if tx.send(()).is_ok() {
            parent.release.cancelled().await;
            self.node.state.lock().started = Some(Instant::now());
        }
    }

    pub fn log(&self, msg: impl AsRef<str>) {
        let text = self.redactor.redact(msg.as_ref());
        let mut state = self.node.state.lock();
        state.logs.extend(text.lines().map(str::to_string));
        if text.is_empty() {
            state.logs.push(String::new());
        }
    }

    /// Marks the test failed and logs `msg`; the body keeps running.
    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(msg);
        self.fail();
    }

    pub fn fail(&self) {
        self.node.state.lock().failed = true;
    }

    /// Marks the test failed, logs `msg` and returns the value that stops the body.
    pub fn fatal(&self, msg: impl AsRef<str>) -> Abort {
        self.error(msg);
        Abort
    }

    pub fn fail_now(&self) -> Abort {
        self.fail();
        Abort
    }

    pub fn skip(&self, msg: impl AsRef<str>) -> Abort {
        self.log(msg);
        self.skip_now()
    }

    pub fn skip_now(&self) -> Abort {
        self.node.state.lock().skipped = true;
        Abort
    }

    pub fn failed(&self) -> bool {
        self.node.state.lock().failed
    }

    pub fn skipped(&self) -> bool {
        self.node.state.lock().skipped
    }

    /// Finishes the root: waits for parallel children, writes any remaining
    /// output and the final result line. Returns whether every test passed.
    pub async fn wait(&self) -> bool {
        self.complete().await;
        self.flush_ready();
        let passed = self.node.outcome() != Outcome::Failed;
        let out = writer::final_lines(
            &self.summary_counts(),
            passed,
            self.shared.started.elapsed(),
            self.shared.options,
        );
        self.write(&out);
        passed
    }

    /// The finished tree as a report document.
    pub fn report(&self) -> Report {
        report::build(&self.node)
    }

    fn add_child(&self, name: &str) -> Arc<Node> {
        let mut state = self.node.state.lock();
        let base = name.replace(' ', "_");
        let count = state.names.entry(base.clone()).or_insert(0);
        let short = if *count == 0 {
            base.clone()
        } else {
            format!("{base}#{:02}", count)
        };
        *count += 1;
        let full = if self.node.name.is_empty() {
            short
        } else {
            format!("{}/{short}", self.node.name)
        };
        let child = Node::new(full, self.node.depth + 1);
        state.children.push(child.clone());
        child
    }

    /// Ends this node's body: releases parallel children, waits for them and
    /// records the outcome.
    async fn complete(&self) {
        self.node.release.cancel();
        let pending = std::mem::take(&mut self.node.state.lock().pending);
        for handle in pending {
            let _ = handle.await;
        }
        let failed = {
            let mut state = self.node.state.lock();
            if state.children.iter().any(|c| c.outcome() == Outcome::Failed) {
                state.failed = true;
            }
            state.duration = state.started.map(|s| s.elapsed()).unwrap_or_default();
            state.done = true;
            state.failed
        };
        if let Some(parent) = &self.parent {
            if failed {
                parent.state.lock().failed = true;
            }
            if parent.depth == 0 {
                self.flush_ready();
            }
        }
    }

    /// Writes every finished root child not yet written, in declaration order.
    fn flush_ready(&self) {
        let mut flushed = self.shared.flushed.lock();
        let children = self.root.state.lock().children.clone();
        let mut out = String::new();
        while let Some(child) = children.get(*flushed) {
            if !child.state.lock().done {
                break;
            }
            writer::render(child, self.shared.options, &mut out);
            *flushed += 1;
        }
        if !out.is_empty() {
            self.write(&out);
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.shared.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to write test output");
        }
    }

    fn summary_counts(&self) -> writer::Counts {
        let mut counts = writer::Counts::default();
        writer::count_leaves(&self.node, &mut counts);
        counts
    }
}

fn panic_message(e: tokio::task::JoinError) -> String {
    match e.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(e) => e.to_string(),
    }
}
