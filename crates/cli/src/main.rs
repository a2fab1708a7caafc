//! Content pipeline driver.
//!
//! Run with: `content <command>`. Settings come from `CONTENT_*` environment
//! variables (or a `.env` file); flags override them.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Load, Scan};

/// Scan and load game content from a data root
#[derive(Parser)]
#[command(name = "content")]
#[command(about = "Content pipeline tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Classify files under the data root without loading them
    Scan(Scan),

    /// Run the full pipeline and print a per-loader summary
    Load(Load),
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan(cmd) => cmd.execute(),
        Command::Load(cmd) => cmd.execute(),
    }
}
