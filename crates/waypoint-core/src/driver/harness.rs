use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info};

use super::version::{AppliedVersionsFn, UpdateVersionFn};
use super::{Adapter, Driver};
use crate::error::{BoxError, Result, WaypointError};
use crate::migration::{Direction, MigrationBody, PlannedMigration};
use crate::parser::ParserOptions;
use crate::registry::Registry;
use crate::shared::SharedConfig;

/// Create a harness over a registry and the two version callbacks.
///
/// The harness runs callable migrations as-is. Content migrations additionally
/// need an adapter, attached with [`Harness::with_adapter`].
pub fn new_driver(
    registry: Arc<Registry>,
    update_version: UpdateVersionFn,
    applied_versions: AppliedVersionsFn,
    config: SharedConfig,
) -> Result<Harness> {
    Ok(Harness {
        registry,
        adapter: None,
        update_version,
        applied_versions,
        config,
        parser_options: ParserOptions::default(),
        closed: AtomicBool::new(false),
    })
}

/// Execution harness implementing [`Driver`].
pub struct Harness {
    registry: Arc<Registry>,
    adapter: Option<Arc<dyn Adapter>>,
    update_version: UpdateVersionFn,
    applied_versions: AppliedVersionsFn,
    config: SharedConfig,
    parser_options: ParserOptions,
    closed: AtomicBool,
}

impl Harness {
    /// Attach the adapter that executes statement groups.
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(WaypointError::Closed);
        }
        Ok(())
    }

    async fn run(&self, planned: &PlannedMigration) -> Result<()> {
        self.ensure_open()?;

        let id = planned.id().to_string();
        let direction = planned.direction;
        let definition = planned
            .migration
            .definition(direction)
            .ok_or_else(|| WaypointError::NotFound(planned.key().to_string()))?;

        let execution_error = |source: BoxError| WaypointError::Execution {
            id: id.clone(),
            direction,
            source,
        };

        let start = Instant::now();
        info!("{} migration: {}", verb(direction), id);

        match definition
            .resolve(&self.parser_options)
            .map_err(|e| execution_error(e.into()))?
        {
            MigrationBody::Statements(change_set) => {
                let adapter = self.adapter.as_ref().ok_or_else(|| {
                    WaypointError::Config(format!(
                        "Migration {} contains statements but no adapter is configured",
                        planned.key()
                    ))
                })?;

                for group in &change_set.groups {
                    debug!(
                        "Executing {} statement(s) for {} (transaction: {})",
                        group.statements.len(),
                        planned.key(),
                        group.use_transaction
                    );
                    adapter.execute(group).await.map_err(execution_error)?;
                }
            }
            MigrationBody::Callable(handler) => {
                handler(self.config.clone()).await.map_err(execution_error)?;
            }
        }

        (self.update_version)(id.clone(), direction, self.config.clone())
            .await
            .map_err(|source| WaypointError::VersionUpdate {
                id: id.clone(),
                direction,
                source,
            })?;

        info!(
            "Migration {} {} in {}ms",
            id,
            past_tense(direction),
            start.elapsed().as_millis()
        );
        Ok(())
    }
}

impl Driver for Harness {
    fn migrate<'a>(&'a self, planned: &'a PlannedMigration) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(planned))
    }

    fn versions(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut versions = (self.applied_versions)(self.config.clone())
                .await
                .map_err(WaypointError::VersionStore)?;
            versions.sort();
            Ok(versions)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(adapter) = &self.adapter {
                adapter
                    .close()
                    .await
                    .map_err(|e| WaypointError::Config(format!("Failed to close adapter: {}", e)))?;
            }
            debug!("Driver closed");
            Ok(())
        })
    }
}

fn verb(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "Applying",
        Direction::Down => "Reverting",
    }
}

fn past_tense(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "applied",
        Direction::Down => "reverted",
    }
}
