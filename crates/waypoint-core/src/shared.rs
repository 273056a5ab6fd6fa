use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Value = Arc<dyn Any + Send + Sync>;

/// Concurrency-safe key/value store threaded through callable migrations and
/// version callbacks.
///
/// Adapters use it to hand database handles and settings to migration code.
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone, Default)]
pub struct SharedConfig {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl SharedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.lock().insert(key.into(), Arc::new(value));
    }

    /// Get a value, or `None` if the key is missing or holds another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.lock().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Remove a value, returning whether the key existed.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConfig")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_and_get_typed() {
        let config = SharedConfig::new();
        config.set("table", "schema_migrations".to_string());
        config.set("retries", 3u32);

        assert_eq!(
            config.get::<String>("table").as_deref().map(String::as_str),
            Some("schema_migrations")
        );
        assert_eq!(config.get::<u32>("retries").as_deref(), Some(&3));
        // Wrong type reads as absent.
        assert!(config.get::<i64>("retries").is_none());
        assert!(config.get::<u32>("missing").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let config = SharedConfig::new();
        let other = config.clone();
        other.set("handle", 42usize);

        assert!(config.contains("handle"));
        assert!(config.remove("handle"));
        assert!(!other.contains("handle"));
        assert!(!config.remove("handle"));
    }

    #[test]
    fn test_concurrent_writers() {
        let config = SharedConfig::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let config = config.clone();
                thread::spawn(move || config.set(format!("key_{:02}", i), i))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(config.keys().len(), 16);
        assert_eq!(config.get::<i32>("key_07").as_deref(), Some(&7));
    }
}
