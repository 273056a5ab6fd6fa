mod changeset;
mod definition;

pub use changeset::{ChangeSet, StatementGroup};
pub use definition::{Definition, MigrationBody, MigrationFn};

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WaypointError};

/// Direction a migration is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = WaypointError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(WaypointError::Parse(format!(
                "Unknown migration direction: {}",
                other
            ))),
        }
    }
}

/// Registry lookup key, rendered as `<id>.<up|down>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationKey {
    pub id: String,
    pub direction: Direction,
}

impl MigrationKey {
    pub fn new(id: impl Into<String>, direction: Direction) -> Self {
        Self {
            id: id.into(),
            direction,
        }
    }

    /// File name used by content stored on disk (e.g. `0001_init.up.sql`).
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self, extension)
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.direction)
    }
}

impl FromStr for MigrationKey {
    type Err = WaypointError;

    fn from_str(s: &str) -> Result<Self> {
        let (id, direction) = s
            .rsplit_once('.')
            .ok_or_else(|| WaypointError::Parse(format!("Invalid migration key: {}", s)))?;

        if id.is_empty() {
            return Err(WaypointError::Parse(format!("Invalid migration key: {}", s)));
        }

        Ok(Self::new(id, direction.parse()?))
    }
}

/// A registered migration: an identifier with its up and optional down definition.
#[derive(Debug, Clone)]
pub struct Migration {
    id: String,
    up: Definition,
    down: Option<Definition>,
}

impl Migration {
    pub fn new(id: impl Into<String>, up: Definition, down: Option<Definition>) -> Self {
        Self {
            id: id.into(),
            up,
            down,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn up(&self) -> &Definition {
        &self.up
    }

    pub fn down(&self) -> Option<&Definition> {
        self.down.as_ref()
    }

    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }

    /// Definition for the given direction, if one was registered.
    pub fn definition(&self, direction: Direction) -> Option<&Definition> {
        match direction {
            Direction::Up => Some(&self.up),
            Direction::Down => self.down.as_ref(),
        }
    }
}

/// A migration bound to the direction it should run in.
#[derive(Debug, Clone)]
pub struct PlannedMigration {
    pub migration: Migration,
    pub direction: Direction,
}

impl PlannedMigration {
    pub fn new(migration: Migration, direction: Direction) -> Self {
        Self {
            migration,
            direction,
        }
    }

    pub fn id(&self) -> &str {
        self.migration.id()
    }

    pub fn key(&self) -> MigrationKey {
        MigrationKey::new(self.migration.id(), self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_parse() {
        let key = MigrationKey::new("201610041422_init", Direction::Up);
        assert_eq!(key.to_string(), "201610041422_init.up");
        assert_eq!(key.file_name("sql"), "201610041422_init.up.sql");

        let parsed: MigrationKey = "201610041425_drop.v2.down".parse().unwrap();
        assert_eq!(parsed.id, "201610041425_drop.v2");
        assert_eq!(parsed.direction, Direction::Down);
    }

    #[test]
    fn test_key_parse_rejects_garbage() {
        assert!("no_direction".parse::<MigrationKey>().is_err());
        assert!("0001.sideways".parse::<MigrationKey>().is_err());
        assert!(".up".parse::<MigrationKey>().is_err());
    }

    #[test]
    fn test_migration_definition_by_direction() {
        let up_only = Migration::new("0001", Definition::content("SELECT 1"), None);
        assert!(up_only.definition(Direction::Up).is_some());
        assert!(up_only.definition(Direction::Down).is_none());
        assert!(!up_only.has_down());

        let planned = PlannedMigration::new(up_only, Direction::Down);
        assert_eq!(planned.key().to_string(), "0001.down");
    }
}
