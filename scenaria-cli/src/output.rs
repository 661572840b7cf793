use std::io::IsTerminal;
use std::path::PathBuf;

use scenaria_exec::config::DEFAULT_CONFIG_FILENAME;
use scenaria_exec::reporter::Options;
use scenaria_exec::{Config, ConfigError};
use serde::Serialize;

use crate::{ConfigArgs, OutputArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_result<T: Serialize>(result: &T) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error(&format!("failed to encode output: {e}")),
    }
}

pub fn print_error(message: &str) {
    eprintln!("error: {message}");
}

/// Path of the config file named by `--config`, or `./scenaria.yaml`.
pub fn config_path(args: &ConfigArgs) -> PathBuf {
    args.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}

/// Loads `--config`, else `./scenaria.yaml` when present, else the built-in
/// defaults rooted at the working directory.
pub fn load_config(args: &ConfigArgs) -> Result<Config, ConfigError> {
    let path = config_path(args);
    if args.config.is_some() || path.exists() {
        return Config::load(&path);
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: ".".to_string(),
        source,
    })?;
    Ok(Config::with_root(cwd))
}

/// Reporter options: flags win over the config file.
pub fn reporter_options(args: &OutputArgs, config: &Config) -> Options {
    Options {
        verbose: args.verbose || config.output.verbose,
        colored: use_color(args.no_color, config.output.colored),
        summary: args.summary || config.output.summary,
    }
}

fn use_color(no_color: bool, configured: Option<bool>) -> bool {
    let env_off = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    if no_color || env_off {
        return false;
    }
    configured.unwrap_or_else(|| std::io::stdout().is_terminal())
}
