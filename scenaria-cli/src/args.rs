use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Config file (defaults to ./scenaria.yaml when present).
    #[arg(long, short, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Print transcripts of passing tests too.
    #[arg(long, short)]
    pub verbose: bool,
    /// Disable colored output. `NO_COLOR` has the same effect.
    #[arg(long)]
    pub no_color: bool,
    /// Print pass/fail/skip counts at the end.
    #[arg(long)]
    pub summary: bool,
}
