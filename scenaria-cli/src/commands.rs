use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;
use crate::output::OutputFormat;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run scenario files (or the configured scenarios).
    Run {
        files: Vec<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List scenarios and their steps without running them.
    List {
        files: Vec<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Create or check scenaria.yaml.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file.
    Init {
        #[command(flatten)]
        config: ConfigArgs,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Load the config and check every scenario entry exists.
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
}
