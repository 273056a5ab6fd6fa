//! Waypoint - versioned schema migrations for SQL databases
//!
//! Register migrations as SQL files or async closures, plan them against the
//! versions already applied, and run them through sqlx.

pub use waypoint_core::*;
pub use waypoint_runtime::{AppliedVersion, Database, Dialect, SqlAdapter, SqlVersionTable};

#[doc(hidden)]
pub use waypoint_core;
#[doc(hidden)]
pub use waypoint_runtime;
