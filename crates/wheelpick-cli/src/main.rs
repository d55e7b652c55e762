//! wheelpick CLI

use clap::Parser;
use crossterm::style::Stylize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use wheelpick_cli::{Cli, ops};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match ops::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("✘ {err:#}");
            if cli.no_color {
                eprintln!("{message}");
            } else {
                eprintln!("{}", message.red());
            }
            ExitCode::FAILURE
        }
    }
}
