use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::render_snippet_at;
use crate::ordered_map::OrderedMap;
use crate::value::{Map, Value};

pub const SCHEMA_VERSION: &str = "scenario/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Plugin name to plugin source, opened before the scenario runs.
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub plugins: OrderedMap<String, String>,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub vars: Map,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub secrets: Map,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(skip)]
    pub filepath: PathBuf,

    #[serde(skip)]
    pub(crate) source: Arc<str>,

    #[serde(skip)]
    pub(crate) line_offset: usize,
}

impl Scenario {
    /// The YAML text of this scenario's document.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Line of the file this document starts at (0-based).
    pub fn line_offset(&self) -> usize {
        self.line_offset
    }

    /// Renders the document lines around `path`, numbered as in the file.
    pub fn snippet(&self, path: &str, colored: bool) -> Option<String> {
        render_snippet_at(&self.source, path, self.line_offset, colored)
    }

    /// Title used for the scenario's report node.
    pub fn display_name(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        self.filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Step {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub vars: Map,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    #[serde(default, with = "duration_serde::opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    #[serde(default, with = "duration_serde::opt", skip_serializing_if = "Option::is_none")]
    pub post_timeout_waiting_limit: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Retry>,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<Bind>,

    /// Another scenario file, relative to this one, run as a nested subtest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

impl Step {
    pub fn display_name(&self, index: usize) -> String {
        if !self.title.is_empty() {
            self.title.clone()
        } else if !self.id.is_empty() {
            self.id.clone()
        } else {
            format!("steps[{index}]")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bind {
    #[serde(default)]
    pub vars: Map,
}

/// Retry policy of a step. Exactly one backoff must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Retry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<ConstantBackoff>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponential: Option<ExponentialBackoff>,

    /// Also retry attempts that ran past the step timeout.
    #[serde(default)]
    pub timeout: bool,
}

impl Retry {
    pub fn max_retries(&self) -> u32 {
        match (&self.constant, &self.exponential) {
            (Some(c), _) => c.max_retries,
            (None, Some(e)) => e.max_retries,
            (None, None) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConstantBackoff {
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExponentialBackoff {
    #[serde(with = "duration_serde")]
    pub initial_interval: Duration,

    #[serde(default = "default_max_interval", with = "duration_serde")]
    pub max_interval: Duration,

    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Randomization factor in `[0, 1]`; each delay is spread by `±jitter`.
    #[serde(default)]
    pub jitter: f64,

    pub max_retries: u32,
}

fn default_max_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_factor() -> f64 {
    2.0
}

/// Go-style duration strings (`1m30s`, `50ms`) for `std::time::Duration` fields.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use chrono::TimeDelta;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::value::duration;

    pub fn parse(text: &str) -> Result<Duration, String> {
        let d = duration::parse(text).map_err(|e| e.to_string())?;
        d.to_std()
            .map_err(|_| format!("duration {text:?} must not be negative"))
    }

    pub fn format(d: &Duration) -> String {
        duration::format(TimeDelta::from_std(*d).unwrap_or(TimeDelta::MAX))
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).map_err(D::Error::custom)
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_str(&format(d)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|text| parse(&text).map_err(D::Error::custom))
                .transpose()
        }
    }
}
