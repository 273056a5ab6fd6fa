use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{BoxError, Result, WaypointError};
use crate::migration::{Definition, Direction, Migration, MigrationKey};
use crate::shared::SharedConfig;

/// File extension for content-backed migrations on disk.
pub const CONTENT_EXTENSION: &str = "sql";

/// Registry of migration definitions keyed by `<id>.<up|down>`.
///
/// Every operation, reads included, takes the same lock: registration is a
/// start-up concern and several bundles may register into one instance.
/// Registering a key twice is rejected; nothing is ever overwritten.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: Mutex<BTreeMap<MigrationKey, Definition>>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<MigrationKey, Definition>> {
        self.definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a definition for one direction of a migration.
    pub fn register(
        &self,
        id: impl Into<String>,
        direction: Direction,
        definition: Definition,
    ) -> Result<()> {
        let key = MigrationKey::new(id, direction);
        if key.id.trim().is_empty() {
            return Err(WaypointError::Config(
                "Migration identifier must not be empty".into(),
            ));
        }

        let mut definitions = self.lock();
        if definitions.contains_key(&key) {
            return Err(WaypointError::DuplicateIdentifier(key.to_string()));
        }

        debug!("Registered migration {}", key);
        definitions.insert(key, definition);
        Ok(())
    }

    /// Register raw migration content.
    pub fn register_content(
        &self,
        id: impl Into<String>,
        direction: Direction,
        content: impl Into<String>,
    ) -> Result<()> {
        self.register(id, direction, Definition::content(content))
    }

    /// Register a programmatic migration.
    pub fn register_callable<F, Fut>(
        &self,
        id: impl Into<String>,
        direction: Direction,
        f: F,
    ) -> Result<()>
    where
        F: Fn(SharedConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.register(id, direction, Definition::callable(f))
    }

    /// All registered keys as `<id>.<up|down>` strings, in string order.
    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().map(|k| k.to_string()).collect();
        keys.sort();
        keys
    }

    /// Fetch the definition registered under `key` (`<id>.<up|down>`).
    pub fn fetch(&self, key: &str) -> Result<Definition> {
        let parsed: MigrationKey = key
            .parse()
            .map_err(|_| WaypointError::NotFound(key.to_string()))?;
        self.fetch_key(&parsed)
    }

    pub fn fetch_key(&self, key: &MigrationKey) -> Result<Definition> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| WaypointError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &MigrationKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Group definitions into migrations, ascending by identifier.
    pub fn migrations(&self) -> Result<Vec<Migration>> {
        let definitions = self.lock();
        let mut grouped: BTreeMap<&str, (Option<&Definition>, Option<&Definition>)> =
            BTreeMap::new();

        for (key, definition) in definitions.iter() {
            let entry = grouped.entry(key.id.as_str()).or_default();
            match key.direction {
                Direction::Up => entry.0 = Some(definition),
                Direction::Down => entry.1 = Some(definition),
            }
        }

        grouped
            .into_iter()
            .map(|(id, (up, down))| {
                let up = up.ok_or_else(|| {
                    WaypointError::Config(format!(
                        "Migration {} has a down definition but no up definition",
                        id
                    ))
                })?;
                Ok(Migration::new(id, up.clone(), down.cloned()))
            })
            .collect()
    }

    /// Register every definition of another registry into this one.
    ///
    /// Fails on the first key both registries share; definitions registered
    /// before the conflict stay registered.
    pub fn merge(&self, other: &Registry) -> Result<()> {
        let incoming: Vec<(MigrationKey, Definition)> = other
            .lock()
            .iter()
            .map(|(k, d)| (k.clone(), d.clone()))
            .collect();

        for (key, definition) in incoming {
            self.register(key.id, key.direction, definition)?;
        }
        Ok(())
    }

    /// Load content-backed migrations from a directory.
    ///
    /// Files must be named `<id>.up.sql` or `<id>.down.sql`; anything else is
    /// skipped. A missing directory registers nothing.
    pub fn load_dir(&self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            debug!("Migrations directory does not exist: {:?}", dir);
            return Ok(0);
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match content_key(&path) {
                Some(key) => files.push((key, path)),
                None => debug!("Skipping non-migration file {:?}", path),
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        let count = files.len();

        for (key, path) in files {
            let content = std::fs::read_to_string(&path)?;
            self.register(key.id, key.direction, Definition::Content(content))?;
        }

        debug!("Loaded {} migration files from {:?}", count, dir);
        Ok(count)
    }

    /// Get the number of registered definitions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Parse `<id>.<up|down>.sql` into a key.
fn content_key(path: &Path) -> Option<MigrationKey> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{}", CONTENT_EXTENSION))?;
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.list().is_empty());
        assert!(registry.migrations().unwrap().is_empty());
    }

    #[test]
    fn test_register_and_fetch() {
        let registry = Registry::new();
        registry
            .register_content("0001_init", Direction::Up, "CREATE TABLE a (id int);")
            .unwrap();
        registry
            .register_callable("0001_init", Direction::Down, |_| async { Ok(()) })
            .unwrap();

        assert_eq!(registry.list(), vec!["0001_init.down", "0001_init.up"]);
        assert!(matches!(
            registry.fetch("0001_init.up").unwrap(),
            Definition::Content(_)
        ));
        assert!(registry.fetch("0001_init.down").unwrap().is_callable());
    }

    #[test]
    fn test_fetch_missing_reports_exact_key() {
        let registry = Registry::new();
        registry
            .register_content("0001_init", Direction::Up, "SELECT 1")
            .unwrap();

        match registry.fetch("0001_init.down") {
            Err(WaypointError::NotFound(key)) => assert_eq!(key, "0001_init.down"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        match registry.fetch("garbage") {
            Err(WaypointError::NotFound(key)) => assert_eq!(key, "garbage"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        registry
            .register_content("0001_init", Direction::Up, "SELECT 1")
            .unwrap();

        let err = registry
            .register_callable("0001_init", Direction::Up, |_| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, WaypointError::DuplicateIdentifier(ref k) if k == "0001_init.up"));

        // Original definition is untouched.
        assert!(matches!(
            registry.fetch("0001_init.up").unwrap(),
            Definition::Content(ref s) if s == "SELECT 1"
        ));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let registry = Registry::new();
        let err = registry
            .register_content("  ", Direction::Up, "SELECT 1")
            .unwrap_err();
        assert!(matches!(err, WaypointError::Config(_)));
    }

    #[test]
    fn test_concurrent_registration_loses_nothing() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .register_content(format!("{:04}_m", i), Direction::Up, "SELECT 1")
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 32);
        assert_eq!(registry.migrations().unwrap().len(), 32);
    }

    #[test]
    fn test_migrations_grouped_and_sorted() {
        let registry = Registry::new();
        registry.register_content("0002_b", Direction::Up, "SELECT 2").unwrap();
        registry.register_content("0001_a", Direction::Up, "SELECT 1").unwrap();
        registry.register_content("0001_a", Direction::Down, "SELECT -1").unwrap();

        let migrations = registry.migrations().unwrap();
        let ids: Vec<&str> = migrations.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["0001_a", "0002_b"]);
        assert!(migrations[0].has_down());
        assert!(!migrations[1].has_down());
    }

    #[test]
    fn test_down_without_up_is_config_error() {
        let registry = Registry::new();
        registry.register_content("0001_a", Direction::Down, "SELECT 1").unwrap();
        assert!(matches!(
            registry.migrations().unwrap_err(),
            WaypointError::Config(_)
        ));
    }

    #[test]
    fn test_merge_bundles() {
        let core = Registry::new();
        core.register_content("0001_core", Direction::Up, "SELECT 1").unwrap();

        let plugin = Registry::new();
        plugin.register_content("0002_plugin", Direction::Up, "SELECT 2").unwrap();

        core.merge(&plugin).unwrap();
        assert_eq!(core.len(), 2);

        let clash = Registry::new();
        clash.register_content("0001_core", Direction::Up, "SELECT 3").unwrap();
        assert!(matches!(
            core.merge(&clash).unwrap_err(),
            WaypointError::DuplicateIdentifier(_)
        ));
    }

    #[test]
    fn test_load_dir_missing() {
        let registry = Registry::new();
        let count = registry.load_dir(Path::new("/nonexistent/path")).unwrap();
        assert_eq!(count, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_dir_reads_up_and_down_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("0002_posts.up.sql"), "CREATE TABLE posts (id int);").unwrap();
        fs::write(dir.path().join("0001_users.up.sql"), "CREATE TABLE users (id int);").unwrap();
        fs::write(dir.path().join("0001_users.down.sql"), "DROP TABLE users;").unwrap();
        fs::write(dir.path().join("readme.txt"), "Not a migration").unwrap();
        fs::write(dir.path().join("0003_old.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("backup.up.sql.bak"), "Backup").unwrap();

        let registry = Registry::new();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 3);

        let migrations = registry.migrations().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].id(), "0001_users");
        assert!(migrations[0].has_down());
        assert_eq!(migrations[1].id(), "0002_posts");
    }
}
