//! AutoMate ML - Main Entry Point
//!
//! Scripted subcommands, or the interactive wizard when none is given.

use clap::Parser;
use automate_ml::cli::{print_error, run, Cli};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "automate_ml=debug" } else { "automate_ml=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    if let Err(e) = run(cli) {
        print_error(&e);
        std::process::exit(1);
    }
}
