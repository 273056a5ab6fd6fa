use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use console::style;
use std::fs;
use std::path::{Path, PathBuf};

use waypoint_core::{Direction, MigrationKey};

/// Create a blank up/down migration pair.
#[derive(Parser)]
pub struct NewCommand {
    /// Migration name, e.g. `add_users`.
    pub name: String,

    /// Directory to write the files into.
    #[arg(short, long, default_value = "migrations")]
    pub dir: String,
}

impl NewCommand {
    pub async fn execute(self) -> Result<()> {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let (up, down) = create_migration_files(Path::new(&self.dir), &self.name, &timestamp)?;

        println!();
        println!("  {} Created migration:", style("✓").green());
        println!("    {}", style(up.display()).cyan());
        println!("    {}", style(down.display()).cyan());
        println!();
        Ok(())
    }
}

/// Write empty `<timestamp>_<name>.up.sql` and `.down.sql` files into `dir`.
pub fn create_migration_files(
    dir: &Path,
    name: &str,
    timestamp: &str,
) -> Result<(PathBuf, PathBuf)> {
    let slug = slugify(name);
    if slug.is_empty() {
        anyhow::bail!("Migration name must contain letters or digits: {:?}", name);
    }

    let id = format!("{}_{}", timestamp, slug);
    let up = dir.join(MigrationKey::new(id.clone(), Direction::Up).file_name("sql"));
    let down = dir.join(MigrationKey::new(id, Direction::Down).file_name("sql"));

    for path in [&up, &down] {
        if path.exists() {
            anyhow::bail!("Migration file already exists: {}", path.display());
        }
    }

    fs::create_dir_all(dir)?;
    fs::write(&up, "")?;
    fs::write(&down, "")?;
    Ok((up, down))
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
