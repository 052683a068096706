//! CLI entry point for ghoauth.
//!
//! This binary provides the `ghoauth` command. Every subcommand first runs
//! the GitHub OAuth web flow to obtain a user token, then performs a single
//! privileged action with it.

mod deploy_key;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// ghoauth: act on GitHub on behalf of a user authorized through OAuth.
#[derive(Parser)]
#[command(
    name = "ghoauth",
    version,
    about = "Act on GitHub repositories with a browser-authorized OAuth token",
    long_about = "Authorizes this GitHub OAuth app through your browser, then uses the \
                  resulting token to act on a repository. The app credentials are read \
                  from CLIENT_ID and CLIENT_SECRET (a .env file is honoured)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a GitHub deploy key to the selected repository.
    AddDeployKey(deploy_key::AddDeployKeyArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error; the environment may be set already.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing("info");

    match cli.command {
        Commands::AddDeployKey(args) => deploy_key::run(args).await,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
