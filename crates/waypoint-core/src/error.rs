use thiserror::Error;

use crate::migration::Direction;

/// Boxed error returned by adapters, callable migrations and version callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for migration operations.
#[derive(Error, Debug)]
pub enum WaypointError {
    #[error("Migration not found: {0}")]
    NotFound(String),

    #[error("Duplicate migration identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Error executing migration {id} ({direction}): {source}")]
    Execution {
        id: String,
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("Migration {id} ({direction}) ran but its version was not recorded: {source}")]
    VersionUpdate {
        id: String,
        direction: Direction,
        #[source]
        source: BoxError,
    },

    #[error("Error reading applied versions: {0}")]
    VersionStore(#[source] BoxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Driver has been closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaypointError {
    /// Migration id carried by execution and version errors.
    pub fn migration_id(&self) -> Option<&str> {
        match self {
            WaypointError::Execution { id, .. } | WaypointError::VersionUpdate { id, .. } => {
                Some(id)
            }
            _ => None,
        }
    }
}

/// Result type alias using WaypointError.
pub type Result<T> = std::result::Result<T, WaypointError>;
