//! Core of the waypoint migration framework.
//!
//! Migrations are registered in a [`Registry`], ordered by the [`Planner`] and
//! executed one at a time by a [`Driver`]. Backing stores plug in through the
//! [`Adapter`] trait and two version callbacks.

pub mod config;
pub mod driver;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod parser;
pub mod planner;
pub mod registry;
pub mod shared;

pub use config::WaypointConfig;
pub use driver::{
    applied_versions_fn, new_driver, update_version_fn, Adapter, AppliedVersionsFn, Driver,
    Harness, MemoryVersionStore, UpdateVersionFn,
};
pub use error::{BoxError, Result, WaypointError};
pub use migration::{
    ChangeSet, Definition, Direction, Migration, MigrationBody, MigrationFn, MigrationKey,
    PlannedMigration, StatementGroup,
};
pub use migrator::{MigrationStatus, Migrator};
pub use parser::ParserOptions;
pub use planner::{Planner, Target};
pub use registry::Registry;
pub use shared::SharedConfig;
