use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use parking_lot::Mutex;

use super::{Node, Options, Outcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Writes one finished subtree in `go test -v` style.
pub(crate) fn render(node: &Node, options: Options, out: &mut String) {
    if options.verbose {
        run_lines(node, out);
    }
    result_lines(node, options, 0, out);
}

fn run_lines(node: &Node, out: &mut String) {
    out.push_str(&format!("=== RUN   {}\n", node.name));
    let children = node.state.lock().children.clone();
    for child in &children {
        run_lines(child, out);
    }
}

fn result_lines(node: &Node, options: Options, level: usize, out: &mut String) {
    let outcome = node.outcome();
    if !options.verbose && outcome != Outcome::Failed {
        return;
    }
    let (logs, children, duration) = {
        let state = node.state.lock();
        (state.logs.clone(), state.children.clone(), state.duration)
    };
    let indent = "    ".repeat(level);
    out.push_str(&format!(
        "{indent}--- {}: {} ({})\n",
        status(outcome, options.colored),
        node.name,
        seconds(duration)
    ));
    for line in &logs {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("{indent}    {line}\n"));
        }
    }
    for child in &children {
        result_lines(child, options, level + 1, out);
    }
}

fn status(outcome: Outcome, colored: bool) -> String {
    let text = match outcome {
        Outcome::Passed => "PASS",
        Outcome::Failed => "FAIL",
        Outcome::Skipped => "SKIP",
    };
    if !colored {
        return text.to_string();
    }
    match outcome {
        Outcome::Passed => text.green().to_string(),
        Outcome::Failed => text.red().to_string(),
        Outcome::Skipped => text.yellow().to_string(),
    }
}

fn seconds(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}

pub(crate) fn count_leaves(node: &Node, counts: &mut Counts) {
    let children = node.state.lock().children.clone();
    if children.is_empty() {
        if node.depth == 0 {
            return;
        }
        match node.outcome() {
            Outcome::Passed => counts.passed += 1,
            Outcome::Failed => counts.failed += 1,
            Outcome::Skipped => counts.skipped += 1,
        }
        return;
    }
    for child in &children {
        count_leaves(child, counts);
    }
}

pub(crate) fn final_lines(counts: &Counts, passed: bool, elapsed: Duration, options: Options) -> String {
    let mut out = String::new();
    if passed {
        out.push_str(&format!("{}\n", status(Outcome::Passed, options.colored)));
        out.push_str(&format!("ok  \t{}\n", seconds(elapsed)));
    } else {
        out.push_str(&format!("{}\n", status(Outcome::Failed, options.colored)));
        out.push_str(&format!("FAIL\t{}\n", seconds(elapsed)));
    }
    if options.summary {
        out.push_str(&format!(
            "\n{} passed, {} failed, {} skipped\n",
            counts.passed, counts.failed, counts.skipped
        ));
    }
    out
}

/// An in-memory output sink whose contents stay readable after being handed
/// to a reporter.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
