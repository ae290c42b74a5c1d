//! sorastream - playback session engine CLI
//!
//! # Usage
//!
//! ```bash
//! sorastream simulate show-s01e01 --duration 1440 --ticks 30
//! sorastream resume show-s01e01 --json
//! sorastream history
//! ```

use clap::Parser;
use tracing_subscriber::prelude::*;

use sorastream::cli::{Cli, Command, ExitCode, Output};
use sorastream::commands;
use sorastream::config::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    run_cli(cli).await.into()
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };
    tracing::debug!(?config, "config loaded");

    match cli.command {
        Command::Simulate(cmd) => commands::simulate_cmd(cmd, &config, &output).await,
        Command::Resume(cmd) => commands::resume_cmd(cmd, &config, &output),
        Command::Progress(cmd) => commands::progress_cmd(cmd, &config, &output),
        Command::History(cmd) => commands::history_cmd(cmd, &config, &output),
        Command::Style(cmd) => commands::style_cmd(cmd, &config, cli.config, &output),
    }
}

/// Logs go to stderr so JSON on stdout stays parseable
fn init_logging(quiet: bool) {
    let default = if quiet { "sorastream=warn" } else { "sorastream=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
