use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use waypoint_core::config::DatabaseConfig;
use waypoint_core::error::{Result, WaypointError};

use crate::sql::Dialect;

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
    config: DatabaseConfig,
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(WaypointError::Config("Database URL is empty".into()));
        }
        let dialect = Dialect::from_url(&config.url)?;

        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.pool_size.max(1))
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs));

        // Every connection to an in-memory SQLite database sees its own empty
        // database, so keep exactly one alive for the pool's lifetime.
        if is_sqlite_memory(&config.url) {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options
            .connect(&config.url)
            .await
            .map_err(|e| WaypointError::Config(format!("Failed to connect to database: {}", e)))?;

        debug!("Connected to {} database", dialect);

        Ok(Self {
            pool,
            dialect,
            config: config.clone(),
        })
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| WaypointError::Config(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_sqlite_memory(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool_size: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_sqlite_memory() {
        assert!(is_sqlite_memory("sqlite::memory:"));
        assert!(is_sqlite_memory("sqlite:file:app?mode=memory&cache=shared"));
        assert!(!is_sqlite_memory("sqlite://data/app.db"));
        assert!(!is_sqlite_memory("postgres://localhost/memory"));
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let err = Database::from_config(&DatabaseConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WaypointError::Config(_)));
    }

    #[tokio::test]
    async fn test_memory_database_keeps_state() {
        let db = Database::from_config(&memory_config()).await.unwrap();
        assert_eq!(db.dialect(), Dialect::Sqlite);
        db.health_check().await.unwrap();

        sqlx::query("CREATE TABLE kept (id INTEGER)")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO kept (id) VALUES (1)")
            .execute(db.pool())
            .await
            .unwrap();

        db.close().await;
    }
}
