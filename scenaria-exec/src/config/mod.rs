//! `scenaria.yaml`: which scenarios to run and how.
//!
//! Relative paths resolve against the directory of the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use scenaria_core::error::Violation;
use scenaria_core::ordered_map::OrderedMap;
use scenaria_core::scenario::parse_duration;
use scenaria_core::value::Map;
use serde::{Deserialize, Deserializer, Serialize};
use walkdir::WalkDir;

pub const CONFIG_SCHEMA_VERSION: &str = "config/v1";
pub const DEFAULT_CONFIG_FILENAME: &str = "scenaria.yaml";

/// Written by `scenaria config init`.
pub const DEFAULT_CONFIG: &str = "\
schemaVersion: config/v1

scenarios:
  - scenarios

pluginDirectory: plugins

output:
  verbose: false
  colored: true
  report:
    json:
      filename: report.json
    junit:
      filename: junit.xml
";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config {path}:{}", violations_text(.violations))]
    Invalid {
        path: String,
        violations: Vec<Violation>,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

fn violations_text(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("\n  {v}")).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub schema_version: String,

    #[serde(default)]
    pub scenarios: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub plugins: OrderedMap<String, PluginConfig>,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub vars: Map,

    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub secrets: Map,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub protocols: ProtocolsConfig,

    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(skip)]
    excludes: Vec<Regex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    pub src: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Regexes; discovered files whose path matches any of them are skipped.
    #[serde(default)]
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colored: Option<bool>,
    #[serde(default)]
    pub summary: bool,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default)]
    pub json: ReportFileConfig,
    #[serde(default)]
    pub junit: ReportFileConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolsConfig {
    #[serde(default)]
    pub http: HttpProtocolConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpProtocolConfig {
    /// Default client timeout.
    #[serde(
        default,
        deserialize_with = "opt_duration",
        skip_serializing_if = "Option::is_none",
        serialize_with = "ser_opt_duration"
    )]
    pub timeout: Option<Duration>,
}

fn opt_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    let text: Option<String> = Option::deserialize(d)?;
    text.map(|t| parse_duration(&t).map_err(serde::de::Error::custom))
        .transpose()
}

fn ser_opt_duration<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_str(&format!("{}ms", d.as_millis())),
        None => s.serialize_none(),
    }
}

impl Config {
    /// Built-in defaults rooted at `root`, used when no config file exists.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&text, &shown, root)
    }

    /// Parses and validates config text. `path` only names the file in errors.
    pub fn parse(text: &str, path: &str, root: PathBuf) -> Result<Self, ConfigError> {
        let mut cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
        cfg.root = root;
        cfg.validate(path)?;
        Ok(cfg)
    }

    fn validate(&mut self, path: &str) -> Result<(), ConfigError> {
        let mut violations = Vec::new();
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            violations.push(Violation::new(
                "schemaVersion",
                format!(
                    "unknown schema version {:?} (expected {CONFIG_SCHEMA_VERSION:?})",
                    self.schema_version
                ),
            ));
        }
        for (name, plugin) in &self.plugins {
            if plugin.src.trim().is_empty() {
                violations.push(Violation::new(format!("plugins.{name}.src"), "must not be empty"));
            }
        }
        self.excludes.clear();
        for (i, pattern) in self.input.excludes.iter().enumerate() {
            match Regex::new(pattern) {
                Ok(re) => self.excludes.push(re),
                Err(e) => violations.push(Violation::new(
                    format!("input.excludes[{i}]"),
                    format!("invalid regexp {pattern:?}: {e}"),
                )),
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                path: path.to_string(),
                violations,
            })
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Directory plugin sources are relative to.
    pub fn plugin_dir(&self) -> PathBuf {
        match &self.plugin_directory {
            Some(dir) => self.resolve(dir),
            None => self.root.clone(),
        }
    }

    pub fn json_report(&self) -> Option<PathBuf> {
        self.output.report.json.filename.as_deref().map(|p| self.resolve(p))
    }

    pub fn junit_report(&self) -> Option<PathBuf> {
        self.output.report.junit.filename.as_deref().map(|p| self.resolve(p))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.excludes.iter().any(|re| re.is_match(&text))
    }

    /// Scenario files to run: `files` when given, otherwise the configured
    /// `scenarios` entries. Directories are walked for `.yaml`/`.yml` files in
    /// sorted order, skipping excluded paths; files named directly are kept.
    pub fn discover(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
        let entries: Vec<PathBuf> = if files.is_empty() {
            self.scenarios.iter().map(|p| self.resolve(p)).collect()
        } else {
            files.to_vec()
        };
        let mut out = Vec::new();
        for entry in entries {
            let meta = std::fs::metadata(&entry).map_err(|source| ConfigError::Io {
                path: entry.display().to_string(),
                source,
            })?;
            if !meta.is_dir() {
                out.push(entry);
                continue;
            }
            for item in WalkDir::new(&entry).sort_by_file_name() {
                let item = item.map_err(|source| ConfigError::Walk {
                    path: entry.display().to_string(),
                    source,
                })?;
                let path = item.path();
                let is_yaml = path
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml");
                if item.file_type().is_file() && is_yaml && !self.is_excluded(path) {
                    out.push(path.to_path_buf());
                }
            }
        }
        Ok(out)
    }
}
