use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{Result, WaypointError};
use crate::migration::{Direction, Migration, MigrationKey, PlannedMigration};
use crate::registry::Registry;

/// How far a plan should go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// Every eligible migration.
    #[default]
    Latest,
    /// Up: everything up to and including the id. Down: everything above it.
    Version(String),
    /// At most this many migrations.
    Steps(usize),
}

/// Builds execution plans from a registry.
pub struct Planner<'a> {
    registry: &'a Registry,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Plan the migrations needed to move from `applied` towards `target`.
    pub fn plan(
        &self,
        applied: &[String],
        direction: Direction,
        target: &Target,
    ) -> Result<Vec<PlannedMigration>> {
        plan(self.registry.migrations()?, applied, direction, target)
    }
}

/// Plan over an explicit list of migrations.
///
/// Duplicate identifiers in either list are rejected before anything is ordered.
pub fn plan(
    mut migrations: Vec<Migration>,
    applied: &[String],
    direction: Direction,
    target: &Target,
) -> Result<Vec<PlannedMigration>> {
    let mut known = HashSet::new();
    for migration in &migrations {
        if !known.insert(migration.id().to_string()) {
            return Err(WaypointError::DuplicateIdentifier(migration.id().to_string()));
        }
    }

    let mut applied_set = HashSet::new();
    for id in applied {
        if !applied_set.insert(id.as_str()) {
            return Err(WaypointError::DuplicateIdentifier(id.clone()));
        }
    }

    if let Target::Version(version) = target {
        if !known.contains(version) {
            return Err(WaypointError::NotFound(
                MigrationKey::new(version.as_str(), direction).to_string(),
            ));
        }
    }

    migrations.sort_by(|a, b| a.id().cmp(b.id()));

    let planned = match direction {
        Direction::Up => {
            for id in applied {
                if !known.contains(id) {
                    warn!("Applied migration {} is not registered; ignoring", id);
                }
            }

            let pending = migrations
                .into_iter()
                .filter(|m| !applied_set.contains(m.id()))
                .filter(|m| match target {
                    Target::Version(version) => m.id() <= version.as_str(),
                    _ => true,
                });
            limit(pending, target)
                .map(|m| PlannedMigration::new(m, Direction::Up))
                .collect::<Vec<_>>()
        }
        Direction::Down => {
            let mut reverted: Vec<&String> = applied
                .iter()
                .filter(|id| match target {
                    Target::Version(version) => id.as_str() > version.as_str(),
                    _ => true,
                })
                .collect();
            reverted.sort();
            reverted.reverse();

            let mut planned = Vec::new();
            for id in limit(reverted.into_iter(), target) {
                let migration = migrations
                    .iter()
                    .find(|m| m.id() == id.as_str())
                    .filter(|m| m.has_down())
                    .ok_or_else(|| {
                        let key = MigrationKey::new(id.as_str(), Direction::Down);
                        WaypointError::NotFound(key.to_string())
                    })?;
                planned.push(PlannedMigration::new(migration.clone(), Direction::Down));
            }
            planned
        }
    };

    debug!(
        "Planned {} migration(s) {} towards {:?}",
        planned.len(),
        direction,
        target
    );
    Ok(planned)
}

fn limit<I: Iterator>(iter: I, target: &Target) -> std::iter::Take<I> {
    let n = match target {
        Target::Steps(n) => *n,
        _ => usize::MAX,
    };
    iter.take(n)
}
