//! Execution contract shared by every backing store.
//!
//! A [`Driver`] runs one planned migration at a time. [`Harness`] is the
//! implementation shipped here: it resolves the definition carried by the
//! planned migration, hands statement groups to an [`Adapter`], runs callable
//! migrations directly and records the outcome through the version callbacks.

mod harness;
mod version;

pub use harness::{new_driver, Harness};
pub use version::{
    applied_versions_fn, update_version_fn, AppliedVersionsFn, MemoryVersionStore,
    UpdateVersionFn,
};

use futures::future::BoxFuture;

use crate::error::{BoxError, Result};
use crate::migration::{PlannedMigration, StatementGroup};

/// Contract for executing migrations against a backing store.
///
/// Calls are expected one at a time, in plan order. Serializing access across
/// processes is the caller's responsibility.
pub trait Driver: Send + Sync {
    /// Execute one planned migration and record it.
    fn migrate<'a>(&'a self, planned: &'a PlannedMigration) -> BoxFuture<'a, Result<()>>;

    /// Identifiers currently recorded as applied, ascending.
    fn versions(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Release backing-store resources. Safe to call more than once.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Backing-store side of statement execution.
pub trait Adapter: Send + Sync {
    /// Execute a group of statements in order, stopping at the first failure.
    ///
    /// When `group.use_transaction` is set the group must run inside one
    /// transaction and leave no effects behind on failure.
    fn execute<'a>(
        &'a self,
        group: &'a StatementGroup,
    ) -> BoxFuture<'a, std::result::Result<(), BoxError>>;

    /// Release connections or handles.
    fn close(&self) -> BoxFuture<'_, std::result::Result<(), BoxError>>;
}
