use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

/// String key-value store holding per-series progress.
///
/// Mirrors the semantics of a browser's local storage: absent keys read as
/// `None`, writes replace the whole value, and the backend may be missing
/// entirely in which case [`StorageBackend::is_available`] reports `false`.
pub trait StorageBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    fn updated_at(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl StorageBackend for Database {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn updated_at(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT updated_at FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

/// Stand-in used when the database cannot be opened.
pub struct UnavailableStorage;

impl StorageBackend for UnavailableStorage {
    fn is_available(&self) -> bool {
        false
    }

    fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("persistent storage is unavailable"))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("persistent storage is unavailable"))
    }

    fn remove_item(&self, _key: &str) -> Result<()> {
        Err(anyhow!("persistent storage is unavailable"))
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use anyhow::{Result, anyhow};

    use super::StorageBackend;

    #[derive(Default)]
    pub(crate) struct MemoryStorage {
        items: RefCell<HashMap<String, String>>,
        pub(crate) writes: Cell<usize>,
    }

    impl MemoryStorage {
        pub(crate) fn with_item(key: &str, value: &str) -> Self {
            let storage = Self::default();
            storage
                .items
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            storage
        }

        pub(crate) fn raw(&self, key: &str) -> Option<String> {
            self.items.borrow().get(key).cloned()
        }

        pub(crate) fn insert(&self, key: &str, value: &str) {
            self.items
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
        }
    }

    impl StorageBackend for MemoryStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            Ok(self.items.borrow().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            self.writes.set(self.writes.get() + 1);
            self.items
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.items.borrow_mut().remove(key);
            Ok(())
        }
    }

    impl<T: StorageBackend + ?Sized> StorageBackend for Rc<T> {
        fn is_available(&self) -> bool {
            (**self).is_available()
        }

        fn get_item(&self, key: &str) -> Result<Option<String>> {
            (**self).get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            (**self).set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            (**self).remove_item(key)
        }
    }

    /// Readable store whose writes always fail, like a full quota.
    #[derive(Default)]
    pub(crate) struct ReadOnlyStorage {
        pub(crate) inner: MemoryStorage,
    }

    impl StorageBackend for ReadOnlyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }

        fn remove_item(&self, _key: &str) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_storage_round_trips_and_overwrites_values() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        assert_eq!(db.get_item("vistos").unwrap(), None);
        db.set_item("vistos", "[1,2]").unwrap();
        db.set_item("vistos", "[1,2,3]").unwrap();
        assert_eq!(db.get_item("vistos").unwrap().as_deref(), Some("[1,2,3]"));
        assert!(db.updated_at("vistos").unwrap().is_some());

        db.remove_item("vistos").unwrap();
        assert_eq!(db.get_item("vistos").unwrap(), None);
    }

    #[test]
    fn sqlite_storage_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vistos.db");
        {
            let db = Database::open(&path).unwrap();
            db.migrate().unwrap();
            db.set_item("vistos_beyblade", "[4]").unwrap();
        }
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert_eq!(
            db.get_item("vistos_beyblade").unwrap().as_deref(),
            Some("[4]")
        );
    }

    #[test]
    fn unavailable_storage_reports_itself() {
        let storage = UnavailableStorage;
        assert!(!storage.is_available());
        assert!(storage.get_item("vistos").is_err());
        assert!(storage.set_item("vistos", "[]").is_err());
    }
}
