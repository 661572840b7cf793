use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod output;

pub use args::*;
use commands::{Command, ConfigCommand};

#[derive(Debug, Parser)]
#[command(name = "scenaria", version, about = "Scenario-based API testing")]
struct Cli {
    /// Write debug logs to stderr.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` with `--debug`.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Run {
            files,
            config,
            output,
        } => cmd::run::run_cmd(&files, &config, &output).await,
        Command::List {
            files,
            config,
            format,
        } => cmd::list::list_cmd(&files, &config, format),
        Command::Config { action } => match action {
            ConfigCommand::Init { config, force } => cmd::config::init_cmd(&config, force),
            ConfigCommand::Validate { config } => cmd::config::validate_cmd(&config),
        },
    }
}
