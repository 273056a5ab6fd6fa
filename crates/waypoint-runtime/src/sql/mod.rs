mod adapter;
mod dialect;
mod version_table;

pub use adapter::SqlAdapter;
pub use dialect::Dialect;
pub use version_table::{AppliedVersion, SqlVersionTable};
