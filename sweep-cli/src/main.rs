//! Sweep CLI
//!
//! Runs scheduled batches of jobs described by a YAML configuration.

mod commands;
mod reporter;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Scheduled batch job runner", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (.yml/.yaml) or directory of YAML files
    #[arg(long, env = "SWEEP_CONFIG", default_value = "sweep.yml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Default log filter for a verbosity level; RUST_LOG overrides it
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,sweep=info",
        _ => "warn,sweep=debug",
    }
}

fn init_logging(verbose: u8) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    handle_command(cli.command, &cli.config).await
}
