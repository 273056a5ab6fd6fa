use futures::future::BoxFuture;
use sqlx::{AnyPool, Executor};
use tracing::debug;

use waypoint_core::config::DatabaseConfig;
use waypoint_core::error::{BoxError, Result, WaypointError};
use waypoint_core::{Adapter, SharedConfig, StatementGroup};

use super::Dialect;
use crate::db::Database;

/// Executes statement groups against a SQL database through sqlx.
#[derive(Debug, Clone)]
pub struct SqlAdapter {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlAdapter {
    /// Shared configuration key under which [`SqlAdapter::share`] stores the pool.
    pub const POOL_KEY: &'static str = "waypoint.pool";

    /// Connect using configuration; the dialect follows the URL.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = Database::from_config(config).await?;
        Self::from_pool(db.pool().clone(), db.dialect()).await
    }

    /// Wrap an existing pool after checking it talks to `expected`.
    pub async fn from_pool(pool: AnyPool, expected: Dialect) -> Result<Self> {
        let actual = backend_of(&pool).await?;
        if actual != expected.backend_name() {
            return Err(WaypointError::Config(format!(
                "Expected a {} connection, got {}",
                expected, actual
            )));
        }
        Ok(Self {
            pool,
            dialect: expected,
        })
    }

    /// Wrap an existing pool, whatever supported engine it talks to.
    pub async fn detect(pool: AnyPool) -> Result<Self> {
        let actual = backend_of(&pool).await?;
        let dialect = Dialect::from_backend_name(&actual).ok_or_else(|| {
            WaypointError::Config(format!("Unsupported database backend: {}", actual))
        })?;
        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Make the pool available to callable migrations.
    pub fn share(&self, config: &SharedConfig) {
        config.set(Self::POOL_KEY, self.pool.clone());
    }

    async fn execute_group(&self, group: &StatementGroup) -> std::result::Result<(), sqlx::Error> {
        if group.use_transaction {
            let mut tx = self.pool.begin().await?;
            for statement in &group.statements {
                debug!("Executing statement in transaction: {}", statement);
                Executor::execute(&mut *tx, sqlx::raw_sql(statement.as_str())).await?;
            }
            // Dropping `tx` on an early return rolls the group back.
            tx.commit().await?;
        } else {
            let mut conn = self.pool.acquire().await?;
            for statement in &group.statements {
                debug!("Executing statement: {}", statement);
                Executor::execute(&mut *conn, sqlx::raw_sql(statement.as_str())).await?;
            }
        }
        Ok(())
    }
}

impl Adapter for SqlAdapter {
    fn execute<'a>(
        &'a self,
        group: &'a StatementGroup,
    ) -> BoxFuture<'a, std::result::Result<(), BoxError>> {
        Box::pin(async move { self.execute_group(group).await.map_err(BoxError::from) })
    }

    fn close(&self) -> BoxFuture<'_, std::result::Result<(), BoxError>> {
        Box::pin(async move {
            self.pool.close().await;
            Ok(())
        })
    }
}

async fn backend_of(pool: &AnyPool) -> Result<String> {
    let conn = pool
        .acquire()
        .await
        .map_err(|e| WaypointError::Config(format!("Failed to inspect connection: {}", e)))?;
    Ok(conn.backend_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_adapter() -> SqlAdapter {
        SqlAdapter::connect(&DatabaseConfig {
            url: "sqlite::memory:".into(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    async fn table_exists(adapter: &SqlAdapter, name: &str) -> bool {
        sqlx::query_as::<_, (String,)>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name.to_string())
        .fetch_optional(adapter.pool())
        .await
        .unwrap()
        .is_some()
    }

    #[tokio::test]
    async fn test_incompatible_pool_is_config_error() {
        let sqlite = memory_adapter().await;
        let err = SqlAdapter::from_pool(sqlite.pool().clone(), Dialect::Postgres)
            .await
            .unwrap_err();
        assert!(matches!(err, WaypointError::Config(ref msg) if msg.contains("PostgreSQL")));
    }

    #[tokio::test]
    async fn test_compatible_pool_accepted() {
        let sqlite = memory_adapter().await;
        let adapter = SqlAdapter::from_pool(sqlite.pool().clone(), Dialect::Sqlite)
            .await
            .unwrap();
        assert_eq!(adapter.dialect(), Dialect::Sqlite);

        let detected = SqlAdapter::detect(sqlite.pool().clone()).await.unwrap();
        assert_eq!(detected.dialect(), Dialect::Sqlite);
    }

    #[tokio::test]
    async fn test_transactional_group_rolls_back() {
        let adapter = memory_adapter().await;
        let group = StatementGroup::new(
            vec![
                "CREATE TABLE t4 (id INTEGER)".into(),
                "INSERT INTO missing_table (id) VALUES (1)".into(),
            ],
            true,
        );

        assert!(adapter.execute(&group).await.is_err());
        assert!(!table_exists(&adapter, "t4").await);
    }

    #[tokio::test]
    async fn test_non_transactional_group_keeps_prefix() {
        let adapter = memory_adapter().await;
        let group = StatementGroup::new(
            vec![
                "CREATE TABLE t5 (id INTEGER)".into(),
                "CREATE TABLE t6 (some error".into(),
                "CREATE TABLE t7 (id INTEGER)".into(),
            ],
            false,
        );

        assert!(adapter.execute(&group).await.is_err());
        assert!(table_exists(&adapter, "t5").await);
        assert!(!table_exists(&adapter, "t7").await);
    }

    #[tokio::test]
    async fn test_multi_statement_string_runs_whole() {
        let adapter = memory_adapter().await;
        let group = StatementGroup::new(
            vec!["CREATE TABLE m1 (id INTEGER);\nCREATE TABLE m2 (id INTEGER)".into()],
            false,
        );

        adapter.execute(&group).await.unwrap();
        assert!(table_exists(&adapter, "m1").await);
        assert!(table_exists(&adapter, "m2").await);
    }

    #[tokio::test]
    async fn test_share_exposes_pool() {
        let adapter = memory_adapter().await;
        let config = SharedConfig::new();
        adapter.share(&config);
        assert!(config.get::<AnyPool>(SqlAdapter::POOL_KEY).is_some());
    }
}
