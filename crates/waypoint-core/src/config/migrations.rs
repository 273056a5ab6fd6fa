use serde::{Deserialize, Serialize};

use crate::error::{Result, WaypointError};
use crate::parser::ParserOptions;

/// Where migrations live and how applied versions are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding `<id>.up.sql` / `<id>.down.sql` files.
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Table recording applied versions.
    #[serde(default = "default_table")]
    pub table: String,

    /// Run statements in a transaction unless a directive says otherwise.
    #[serde(default = "default_transaction")]
    pub default_transaction: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            table: default_table(),
            default_transaction: default_transaction(),
        }
    }
}

impl MigrationsConfig {
    /// Reject table names that are not plain SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            default_transaction: self.default_transaction,
        }
    }
}

/// Check that `name` can be interpolated into SQL as an identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    let re = regex_lite::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .map_err(|e| WaypointError::Config(format!("Invalid identifier pattern: {}", e)))?;

    if !re.is_match(name) {
        return Err(WaypointError::Config(format!(
            "Invalid table name '{}': expected letters, digits and underscores",
            name
        )));
    }
    Ok(())
}

fn default_dir() -> String {
    "migrations".to_string()
}

fn default_table() -> String {
    "schema_migrations".to_string()
}

fn default_transaction() -> bool {
    true
}
