use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kody::{CliApp, CliConfig};

/// Interactive AI project CLI: scans your project into context, forwards
/// instructions to an AI backend, and applies the results.
#[derive(Debug, Parser)]
#[command(name = "kody", version, about)]
struct Args {
    /// Path to the config file (default: ./kody.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Apply project updates without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Startup failures are fatal; everything after this point is recovered
    // inside the command loop.
    let config = match CliConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kody: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("kody: cannot determine working directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut app = CliApp::new(config, root, !args.no_color, args.yes);
    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kody: {e:#}");
            ExitCode::FAILURE
        }
    }
}
