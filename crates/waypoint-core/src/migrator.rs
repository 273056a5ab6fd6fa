//! Plan-and-apply loop over a [`Driver`].

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::Result;
use crate::migration::Direction;
use crate::planner::{Planner, Target};
use crate::registry::Registry;

/// Applied/pending overview of a registry against a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Registered and recorded as applied, ascending.
    pub applied: Vec<String>,
    /// Registered but not applied, ascending.
    pub pending: Vec<String>,
    /// Recorded as applied but unknown to the registry.
    pub unknown: Vec<String>,
}

/// Runs plans produced from a registry through a driver, one migration at a time.
pub struct Migrator<'a, D: Driver + ?Sized> {
    registry: &'a Registry,
    driver: &'a D,
}

impl<'a, D: Driver + ?Sized> Migrator<'a, D> {
    pub fn new(registry: &'a Registry, driver: &'a D) -> Self {
        Self { registry, driver }
    }

    /// Plan and execute migrations in `direction`.
    ///
    /// Stops at the first failure. Returns the ids that were executed.
    pub async fn run(&self, direction: Direction, target: &Target) -> Result<Vec<String>> {
        let applied = self.driver.versions().await?;
        debug!("Already applied migrations: {:?}", applied);

        let plan = Planner::new(self.registry).plan(&applied, direction, target)?;
        if plan.is_empty() {
            info!("No migrations to run");
            return Ok(Vec::new());
        }

        let mut executed = Vec::with_capacity(plan.len());
        for planned in &plan {
            self.driver.migrate(planned).await?;
            executed.push(planned.id().to_string());
        }

        info!("Ran {} migration(s) {}", executed.len(), direction);
        Ok(executed)
    }

    /// Apply every pending migration.
    pub async fn up(&self) -> Result<Vec<String>> {
        self.run(Direction::Up, &Target::Latest).await
    }

    /// Revert the last `count` applied migrations.
    pub async fn rollback(&self, count: usize) -> Result<Vec<String>> {
        self.run(Direction::Down, &Target::Steps(count)).await
    }

    pub async fn status(&self) -> Result<MigrationStatus> {
        let applied = self.driver.versions().await?;
        let applied_set: HashSet<&str> = applied.iter().map(String::as_str).collect();

        let registered: Vec<String> = self
            .registry
            .migrations()?
            .into_iter()
            .map(|m| m.id().to_string())
            .collect();
        let registered_set: HashSet<&str> = registered.iter().map(String::as_str).collect();

        let mut status = MigrationStatus::default();
        for id in &registered {
            if applied_set.contains(id.as_str()) {
                status.applied.push(id.clone());
            } else {
                status.pending.push(id.clone());
            }
        }
        status.unknown = applied
            .iter()
            .filter(|id| !registered_set.contains(id.as_str()))
            .cloned()
            .collect();

        Ok(status)
    }
}
