use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::migration::Direction;
use crate::shared::SharedConfig;

/// Records (Up) or removes (Down) a version entry.
pub type UpdateVersionFn = Arc<
    dyn Fn(String, Direction, SharedConfig) -> BoxFuture<'static, Result<(), BoxError>>
        + Send
        + Sync,
>;

/// Lists every identifier recorded as applied.
pub type AppliedVersionsFn =
    Arc<dyn Fn(SharedConfig) -> BoxFuture<'static, Result<Vec<String>, BoxError>> + Send + Sync>;

/// Box an async closure as an [`UpdateVersionFn`].
pub fn update_version_fn<F, Fut>(f: F) -> UpdateVersionFn
where
    F: Fn(String, Direction, SharedConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(
        move |id: String,
              direction: Direction,
              config: SharedConfig|
              -> BoxFuture<'static, Result<(), BoxError>> {
            Box::pin(f(id, direction, config))
        },
    )
}

/// Box an async closure as an [`AppliedVersionsFn`].
pub fn applied_versions_fn<F, Fut>(f: F) -> AppliedVersionsFn
where
    F: Fn(SharedConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<String>, BoxError>> + Send + 'static,
{
    Arc::new(
        move |config: SharedConfig| -> BoxFuture<'static, Result<Vec<String>, BoxError>> {
            Box::pin(f(config))
        },
    )
}

/// In-process version store for programmatic state and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVersionStore {
    versions: Arc<Mutex<BTreeSet<String>>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded versions.
    pub fn versions(&self) -> Vec<String> {
        self.versions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn update_version_fn(&self) -> UpdateVersionFn {
        let versions = Arc::clone(&self.versions);
        update_version_fn(move |id, direction, _config| {
            let versions = Arc::clone(&versions);
            async move {
                let mut versions = versions.lock().unwrap_or_else(PoisonError::into_inner);
                match direction {
                    Direction::Up => {
                        if !versions.insert(id.clone()) {
                            return Err(format!("version {} is already recorded", id).into());
                        }
                    }
                    Direction::Down => {
                        if !versions.remove(&id) {
                            return Err(format!("version {} is not recorded", id).into());
                        }
                    }
                }
                Ok(())
            }
        })
    }

    pub fn applied_versions_fn(&self) -> AppliedVersionsFn {
        let store = self.clone();
        applied_versions_fn(move |_config| {
            let versions = store.versions();
            async move { Ok(versions) }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryVersionStore::new();
        let update = store.update_version_fn();
        let applied = store.applied_versions_fn();
        let config = SharedConfig::new();

        update("0002_b".into(), Direction::Up, config.clone()).await.unwrap();
        update("0001_a".into(), Direction::Up, config.clone()).await.unwrap();
        assert_eq!(applied(config.clone()).await.unwrap(), vec!["0001_a", "0002_b"]);

        update("0002_b".into(), Direction::Down, config.clone()).await.unwrap();
        assert_eq!(store.versions(), vec!["0001_a"]);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_inconsistent_updates() {
        let store = MemoryVersionStore::new();
        let update = store.update_version_fn();
        let config = SharedConfig::new();

        assert!(update("0001_a".into(), Direction::Down, config.clone()).await.is_err());
        update("0001_a".into(), Direction::Up, config.clone()).await.unwrap();
        assert!(update("0001_a".into(), Direction::Up, config).await.is_err());
    }

    #[tokio::test]
    async fn test_closure_helpers_see_shared_config() {
        let update = update_version_fn(|id, _direction, config: SharedConfig| async move {
            config.set("last", id);
            Ok(())
        });
        let config = SharedConfig::new();
        update("0007_g".into(), Direction::Up, config.clone()).await.unwrap();
        assert_eq!(
            config.get::<String>("last").as_deref().map(String::as_str),
            Some("0007_g")
        );
    }
}
