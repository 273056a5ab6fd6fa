//! SQL backing stores for waypoint, built on sqlx's `Any` driver.

pub mod db;
pub mod sql;

pub use db::Database;
pub use sql::{AppliedVersion, Dialect, SqlAdapter, SqlVersionTable};
