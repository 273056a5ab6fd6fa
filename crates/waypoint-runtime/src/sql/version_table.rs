use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::AnyPool;
use tracing::debug;

use waypoint_core::config::validate_identifier;
use waypoint_core::error::{BoxError, Result, WaypointError};
use waypoint_core::{
    applied_versions_fn, update_version_fn, AppliedVersionsFn, Direction, UpdateVersionFn,
};

use super::{Dialect, SqlAdapter};

/// A row of the version table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedVersion {
    pub id: String,
    /// `None` when the stored timestamp cannot be parsed.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Version store kept in a table of the migrated database.
#[derive(Debug, Clone)]
pub struct SqlVersionTable {
    pool: AnyPool,
    dialect: Dialect,
    table: String,
}

impl SqlVersionTable {
    pub fn new(adapter: &SqlAdapter, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            pool: adapter.pool().clone(),
            dialect: adapter.dialect(),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if it does not exist yet.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version VARCHAR(255) NOT NULL PRIMARY KEY,
                applied_at VARCHAR(64) NOT NULL
            )",
            self.table
        );
        sqlx::raw_sql(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                WaypointError::VersionStore(
                    format!("Failed to create version table {}: {}", self.table, e).into(),
                )
            })?;
        debug!("Version table {} ready", self.table);
        Ok(())
    }

    /// Insert (Up) or delete (Down) the row for `id`.
    pub async fn record(
        &self,
        id: &str,
        direction: Direction,
    ) -> std::result::Result<(), BoxError> {
        match direction {
            Direction::Up => {
                let sql = format!(
                    "INSERT INTO {} (version, applied_at) VALUES ({}, {})",
                    self.table,
                    self.dialect.placeholder(1),
                    self.dialect.placeholder(2)
                );
                sqlx::query(&sql)
                    .bind(id.to_string())
                    .bind(Utc::now().to_rfc3339())
                    .execute(&self.pool)
                    .await?;
            }
            Direction::Down => {
                let sql = format!(
                    "DELETE FROM {} WHERE version = {}",
                    self.table,
                    self.dialect.placeholder(1)
                );
                let result = sqlx::query(&sql)
                    .bind(id.to_string())
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(format!("version {} is not recorded in {}", id, self.table).into());
                }
            }
        }
        debug!("Recorded {} {} in {}", id, direction, self.table);
        Ok(())
    }

    /// Applied identifiers, ascending.
    pub async fn applied(&self) -> std::result::Result<Vec<String>, BoxError> {
        let sql = format!("SELECT version FROM {} ORDER BY version", self.table);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(version,)| version).collect())
    }

    /// Applied identifiers with the time they were recorded.
    pub async fn applied_entries(&self) -> Result<Vec<AppliedVersion>> {
        let sql = format!(
            "SELECT version, applied_at FROM {} ORDER BY version",
            self.table
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WaypointError::VersionStore(e.into()))?;

        Ok(rows
            .into_iter()
            .map(|(id, applied_at)| AppliedVersion {
                id,
                applied_at: DateTime::parse_from_rfc3339(&applied_at)
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
            })
            .collect())
    }

    pub fn update_version_fn(&self) -> UpdateVersionFn {
        let table = self.clone();
        update_version_fn(move |id, direction, _config| {
            let table = table.clone();
            async move { table.record(&id, direction).await }
        })
    }

    pub fn applied_versions_fn(&self) -> AppliedVersionsFn {
        let table = self.clone();
        applied_versions_fn(move |_config| {
            let table = table.clone();
            async move { table.applied().await }
        })
    }
}
