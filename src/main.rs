//! seoscout - SEO and content research from the command line
//!
//! Validates configuration, then runs one research or cache-maintenance
//! subcommand. Research results are cached on disk and all remote calls go
//! through a sliding-window rate limiter, so batch usage stays inside the
//! provider's quota.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use seoscout::cli::Cli;
use seoscout::commands;

/// Initializes logging to stderr, honoring RUST_LOG when set
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the shell
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    ExitCode::from(commands::run(cli).await)
}
