use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{Outcome, Report, ReportError};

#[derive(Default)]
struct Totals {
    tests: usize,
    failures: usize,
    skipped: usize,
    time: f64,
}

impl Totals {
    fn of(cases: &[Report]) -> Self {
        let mut t = Totals::default();
        for c in cases {
            t.tests += 1;
            t.time += c.duration;
            match c.outcome {
                Outcome::Failed => t.failures += 1,
                Outcome::Skipped => t.skipped += 1,
                Outcome::Passed => {}
            }
        }
        t
    }

    fn attrs(&self, el: &mut BytesStart<'_>) {
        el.push_attribute(("tests", self.tests.to_string().as_str()));
        el.push_attribute(("failures", self.failures.to_string().as_str()));
        el.push_attribute(("skipped", self.skipped.to_string().as_str()));
        el.push_attribute(("time", format!("{:.3}", self.time).as_str()));
    }
}

/// Writes the report as JUnit XML: one `testsuite` per child of the root
/// (a scenario file) and one `testcase` per grandchild (a scenario).
pub fn write_junit(report: &Report, out: impl Write) -> Result<(), ReportError> {
    let mut w = Writer::new_with_indent(out, b' ', 2);
    let xml = |e: &dyn std::fmt::Display| ReportError::Xml(e.to_string());

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| xml(&e))?;

    let all_cases: Vec<Report> = report
        .children
        .iter()
        .flat_map(|suite| suite.children.iter().cloned())
        .collect();
    let mut root = BytesStart::new("testsuites");
    Totals::of(&all_cases).attrs(&mut root);
    w.write_event(Event::Start(root)).map_err(|e| xml(&e))?;

    for suite in &report.children {
        let mut el = BytesStart::new("testsuite");
        el.push_attribute(("name", suite.name.as_str()));
        Totals::of(&suite.children).attrs(&mut el);
        w.write_event(Event::Start(el)).map_err(|e| xml(&e))?;
        for case in &suite.children {
            write_case(&mut w, &suite.name, case).map_err(|e| xml(&e))?;
        }
        w.write_event(Event::End(BytesEnd::new("testsuite")))
            .map_err(|e| xml(&e))?;
    }

    w.write_event(Event::End(BytesEnd::new("testsuites")))
        .map_err(|e| xml(&e))?;
    Ok(())
}

fn write_case<W: Write>(w: &mut Writer<W>, suite: &str, case: &Report) -> Result<(), std::io::Error> {
    let mut el = BytesStart::new("testcase");
    el.push_attribute(("classname", suite));
    el.push_attribute(("name", case.name.as_str()));
    el.push_attribute(("time", format!("{:.3}", case.duration).as_str()));

    let body = match case.outcome {
        Outcome::Passed => None,
        Outcome::Failed => Some(("failure", "failed")),
        Outcome::Skipped => Some(("skipped", "skipped")),
    };
    let Some((tag, message)) = body else {
        return w.write_event(Event::Empty(el)).map_err(to_io);
    };

    w.write_event(Event::Start(el)).map_err(to_io)?;
    let mut inner = BytesStart::new(tag);
    inner.push_attribute(("message", message));
    let logs = case.all_logs().join("\n");
    w.write_event(Event::Start(inner)).map_err(to_io)?;
    w.write_event(Event::Text(BytesText::new(&logs))).map_err(to_io)?;
    w.write_event(Event::End(BytesEnd::new(tag))).map_err(to_io)?;
    w.write_event(Event::End(BytesEnd::new("testcase"))).map_err(to_io)
}

fn to_io(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, outcome: Outcome, logs: &[&str]) -> Report {
        Report {
            name: name.to_string(),
            outcome,
            duration: 0.25,
            logs: logs.iter().map(|s| s.to_string()).collect(),
            children: Vec::new(),
        }
    }

    #[test]
    fn suites_per_file_and_cases_per_scenario() {
        let report = Report {
            name: String::new(),
            outcome: Outcome::Failed,
            duration: 1.0,
            logs: vec![],
            children: vec![Report {
                name: "echo.yaml".into(),
                outcome: Outcome::Failed,
                duration: 0.5,
                logs: vec![],
                children: vec![
                    case("echo.yaml/ok", Outcome::Passed, &[]),
                    case("echo.yaml/bad", Outcome::Failed, &[".body.message: expected \"world\" but got <x>"]),
                ],
            }],
        };
        let mut buf = Vec::new();
        write_junit(&report, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains("<testsuites tests=\"2\" failures=\"1\" skipped=\"0\" time=\"0.500\">"), "{xml}");
        assert!(xml.contains("<testsuite name=\"echo.yaml\""), "{xml}");
        assert!(xml.contains("<testcase classname=\"echo.yaml\" name=\"echo.yaml/ok\" time=\"0.250\"/>"), "{xml}");
        assert!(xml.contains("<failure message=\"failed\">"), "{xml}");
        assert!(xml.contains("&lt;x&gt;"), "{xml}");
    }
}
