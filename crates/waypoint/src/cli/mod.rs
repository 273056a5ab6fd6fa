mod migrate;
mod new;

pub use migrate::MigrateCommand;
pub use new::NewCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Waypoint - versioned schema migrations
#[derive(Parser)]
#[command(name = "waypoint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply, revert or inspect migrations.
    Migrate(MigrateCommand),

    /// Create a blank up/down migration pair.
    New(NewCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
            .with_target(false)
            .init();

        match self.command {
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::New(cmd) => cmd.execute().await,
        }
    }
}
