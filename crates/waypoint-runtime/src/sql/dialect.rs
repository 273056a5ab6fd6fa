use std::fmt;

use serde::{Deserialize, Serialize};
use waypoint_core::error::{Result, WaypointError};

/// SQL engines the runtime knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Map sqlx's backend name (`AnyConnection::backend_name`).
    pub fn from_backend_name(name: &str) -> Option<Self> {
        match name {
            "PostgreSQL" => Some(Dialect::Postgres),
            "MySQL" => Some(Dialect::MySql),
            "SQLite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or("").to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(WaypointError::Config(format!(
                "Unsupported database URL scheme '{}'",
                scheme
            ))),
        }
    }

    /// Bind parameter for the 1-based position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::Sqlite => "SQLite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_name())
    }
}
