use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::ChangeSet;
use crate::error::{BoxError, Result};
use crate::parser::{self, ParserOptions};
use crate::shared::SharedConfig;

/// Type alias for a registered programmatic migration.
pub type MigrationFn = Arc<
    dyn Fn(SharedConfig) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync,
>;

/// What was registered for one direction of a migration.
#[derive(Clone)]
pub enum Definition {
    /// Raw migration text, parsed when the migration runs.
    Content(String),
    /// A function run against the shared configuration.
    Callable(MigrationFn),
}

impl Definition {
    pub fn content(text: impl Into<String>) -> Self {
        Definition::Content(text.into())
    }

    /// Wrap an async closure as a callable definition.
    pub fn callable<F, Fut>(f: F) -> Self
    where
        F: Fn(SharedConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        let handler: MigrationFn = Arc::new(
            move |config: SharedConfig| -> BoxFuture<'static, std::result::Result<(), BoxError>> {
                Box::pin(f(config))
            },
        );
        Definition::Callable(handler)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Definition::Callable(_))
    }

    /// Turn the definition into something the harness can execute.
    pub fn resolve(&self, options: &ParserOptions) -> Result<MigrationBody> {
        match self {
            Definition::Content(text) => {
                Ok(MigrationBody::Statements(parser::parse(text, options)?))
            }
            Definition::Callable(handler) => Ok(MigrationBody::Callable(Arc::clone(handler))),
        }
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Content(text) => f.debug_tuple("Content").field(&text.len()).finish(),
            Definition::Callable(_) => f.write_str("Callable"),
        }
    }
}

/// Executable form of a definition.
pub enum MigrationBody {
    Statements(ChangeSet),
    Callable(MigrationFn),
}

impl fmt::Debug for MigrationBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationBody::Statements(cs) => f.debug_tuple("Statements").field(cs).finish(),
            MigrationBody::Callable(_) => f.write_str("Callable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_resolves_to_statements() {
        let def = Definition::content("CREATE TABLE a (id int); CREATE TABLE b (id int);");
        match def.resolve(&ParserOptions::default()).unwrap() {
            MigrationBody::Statements(cs) => assert_eq!(cs.statement_count(), 2),
            other => panic!("expected statements, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_callable_resolves_to_function() {
        let def = Definition::callable(|config: SharedConfig| async move {
            config.set("ran", true);
            Ok(())
        });
        assert!(def.is_callable());

        let config = SharedConfig::new();
        match def.resolve(&ParserOptions::default()).unwrap() {
            MigrationBody::Callable(handler) => handler(config.clone()).await.unwrap(),
            other => panic!("expected callable, got {:?}", other),
        }
        assert_eq!(config.get::<bool>("ran").as_deref(), Some(&true));
    }
}
