use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use waypoint_core::{
    new_driver, Direction, Driver, Harness, Migrator, Registry, SharedConfig, Target,
    WaypointConfig,
};
use waypoint_runtime::{AppliedVersion, SqlAdapter, SqlVersionTable};

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,

    /// Configuration file path.
    #[arg(short, long, default_value = "waypoint.toml", global = true)]
    pub config: String,

    /// Migrations directory (overrides the configured one).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply pending migrations.
    Up {
        /// Stop after this migration.
        #[arg(long)]
        to: Option<String>,
    },

    /// Revert applied migrations, newest first.
    Down {
        /// Number of migrations to revert.
        #[arg(default_value = "1", conflicts_with = "to")]
        count: usize,

        /// Revert everything applied after this migration.
        #[arg(long)]
        to: Option<String>,
    },

    /// Show migration status.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct StatusReport<'a> {
    applied: &'a [AppliedVersion],
    pending: &'a [String],
    unknown: &'a [String],
}

struct Session {
    registry: Arc<Registry>,
    table: SqlVersionTable,
    driver: Harness,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let config = self.load_config()?;
        let session = open_session(&config).await?;
        let outcome = self.run(&session).await;
        session.driver.close().await?;
        outcome
    }

    fn load_config(&self) -> Result<WaypointConfig> {
        let mut config = if Path::new(&self.config).exists() {
            WaypointConfig::from_file(&self.config)?
        } else if let Ok(url) = std::env::var("DATABASE_URL") {
            WaypointConfig::default_with_database_url(&url)
        } else {
            anyhow::bail!(
                "Configuration file not found: {}\nCreate it or set DATABASE_URL.",
                self.config
            );
        };

        if let Some(dir) = &self.migrations_dir {
            config.migrations.dir = dir.clone();
        }
        Ok(config)
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let migrator = Migrator::new(&session.registry, &session.driver);

        match &self.action {
            MigrateAction::Up { to } => {
                print_header("Migrations");

                if session.registry.is_empty() {
                    println!("  {} No migrations registered", style("ℹ").blue());
                    return Ok(());
                }

                let target = to.clone().map(Target::Version).unwrap_or_default();
                println!("  {} Applying pending migrations...", style("→").dim());
                let applied = migrator.run(Direction::Up, &target).await?;
                report(&applied, "Applied");
            }

            MigrateAction::Down { count, to } => {
                print_header("Migrations");

                let target = match to {
                    Some(id) => Target::Version(id.clone()),
                    None if *count == 0 => {
                        println!("  {} Nothing to revert (count=0)", style("ℹ").blue());
                        return Ok(());
                    }
                    None => Target::Steps(*count),
                };

                println!("  {} Reverting migrations...", style("→").dim());
                let reverted = migrator.run(Direction::Down, &target).await?;
                report(&reverted, "Reverted");
            }

            MigrateAction::Status { json } => {
                let status = migrator.status().await?;
                let entries: Vec<AppliedVersion> = session
                    .table
                    .applied_entries()
                    .await?
                    .into_iter()
                    .filter(|entry| status.applied.contains(&entry.id))
                    .collect();

                if *json {
                    let report = StatusReport {
                        applied: &entries,
                        pending: &status.pending,
                        unknown: &status.unknown,
                    };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    return Ok(());
                }

                print_header("Migration Status");

                if entries.is_empty() && status.pending.is_empty() && status.unknown.is_empty() {
                    println!("  {} No migrations found", style("ℹ").blue());
                    return Ok(());
                }

                if !entries.is_empty() {
                    println!("  {} Applied:", style("✓").green());
                    for entry in &entries {
                        let at = entry
                            .applied_at
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "unknown time".to_string());
                        println!(
                            "    {} {} ({})",
                            style(&entry.id).cyan(),
                            style("at").dim(),
                            at
                        );
                    }
                }

                if !status.pending.is_empty() {
                    println!("  {} Pending:", style("○").yellow());
                    for id in &status.pending {
                        println!("    {} {}", style("→").dim(), style(id).yellow());
                    }
                }

                if !status.unknown.is_empty() {
                    println!("  {} Applied but not found locally:", style("!").red());
                    for id in &status.unknown {
                        println!("    {} {}", style("?").dim(), style(id).red());
                    }
                }

                println!();
                println!(
                    "  {} {} applied, {} pending",
                    style("ℹ").blue(),
                    status.applied.len(),
                    status.pending.len()
                );
                println!();
            }
        }

        Ok(())
    }
}

async fn open_session(config: &WaypointConfig) -> Result<Session> {
    let registry = Arc::new(Registry::new());
    let loaded = registry.load_dir(Path::new(&config.migrations.dir))?;
    tracing::debug!("Loaded {} migration file(s) from {}", loaded, config.migrations.dir);

    let adapter = SqlAdapter::connect(&config.database).await?;
    let table = SqlVersionTable::new(&adapter, config.migrations.table.clone())?;
    table.ensure_table().await?;

    let shared = SharedConfig::new();
    adapter.share(&shared);

    let driver = new_driver(
        Arc::clone(&registry),
        table.update_version_fn(),
        table.applied_versions_fn(),
        shared,
    )?
    .with_adapter(adapter)
    .with_parser_options(config.migrations.parser_options());

    Ok(Session {
        registry,
        table,
        driver,
    })
}

fn print_header(title: &str) {
    println!();
    println!("  {} {}", style("WAYPOINT").bold().cyan(), title);
    println!();
}

fn report(ids: &[String], verb: &str) {
    if ids.is_empty() {
        println!("  {} Already up to date", style("ℹ").blue());
    } else {
        for id in ids {
            println!("  {} {}: {}", style("✓").green(), verb, id);
        }
        println!();
        println!("  {} {} {} migration(s)", style("✓").green(), verb, ids.len());
    }
    println!();
}
