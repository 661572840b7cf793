use scenaria_core::error::Error;
use scenaria_core::scenario::Scenario;

/// Formats each failure as `path: message`, followed by the document lines
/// around `path` when it can be located in the scenario.
pub fn render_error(err: &Error, scenario: Option<&Scenario>, colored: bool) -> String {
    let mut out = Vec::new();
    for e in err.errors() {
        let mut text = e.to_string();
        if let Some(snippet) = scenario.and_then(|s| s.snippet(&e.path, colored)) {
            text.push('\n');
            text.push_str(snippet.trim_end());
        }
        out.push(text);
    }
    out.join("\n")
}
