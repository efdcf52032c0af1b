mod batch;
mod cli;
mod config;
mod instance;
mod judge;
mod outcome;
mod predictions;
mod report;
mod run;
mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eval", version, about = "Batch harness for fixer")]
struct Cli {
    /// Agent config file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = "fixer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fix every selected instance of a dataset split.
    Run(cli::RunArgs),
    /// Summarize the prediction store.
    Report {
        #[arg(long, default_value = "/tmp/fixer")]
        root_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fixer::logging::init("info");
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cli::run_dataset(cli.config, args).await,
        Command::Report { root_path } => cli::report(&root_path),
    }
}
