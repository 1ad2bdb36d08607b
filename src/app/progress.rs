use tracing::{debug, warn};

use crate::db::StorageBackend;

/// Watched-episode sets, one storage key per series.
///
/// Values are JSON arrays of episode ids in insertion order. Reads fall back
/// through legacy keys and copy the first valid value forward; failures of
/// the backend never surface to callers.
pub(crate) struct ProgressStore {
    backend: Box<dyn StorageBackend>,
}

impl ProgressStore {
    pub(crate) fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub(crate) fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub(crate) fn updated_at(&self, key: &str) -> Option<String> {
        if !self.is_available() {
            return None;
        }
        self.backend.updated_at(key).ok().flatten()
    }

    pub(crate) fn load(&self, key: &str, legacy_keys: &[String]) -> Vec<u32> {
        if !self.is_available() {
            return Vec::new();
        }

        let keys = std::iter::once(key)
            .chain(legacy_keys.iter().map(String::as_str))
            .filter(|candidate| !candidate.is_empty());
        for candidate in keys {
            let raw = match self.backend.get_item(candidate) {
                Ok(Some(raw)) if !raw.is_empty() => raw,
                Ok(_) => continue,
                Err(err) => {
                    warn!(key = candidate, error = %err, "failed to read progress");
                    continue;
                }
            };
            let Some(ids) = parse_ids(&raw) else {
                debug!(key = candidate, "ignoring malformed progress value");
                continue;
            };

            if candidate != key {
                debug!(from = candidate, to = key, "migrating legacy progress key");
                self.save(key, &ids);
            }
            return ids;
        }
        Vec::new()
    }

    pub(crate) fn save(&self, key: &str, ids: &[u32]) {
        if !self.is_available() {
            return;
        }
        let raw = match serde_json::to_string(ids) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize progress");
                return;
            }
        };
        if let Err(err) = self.backend.set_item(key, &raw) {
            warn!(key, error = %err, "failed to persist progress");
        }
    }

    pub(crate) fn ensure_marked(
        &self,
        key: &str,
        episode_id: u32,
        legacy_keys: &[String],
    ) -> Vec<u32> {
        let mut current = self.load(key, legacy_keys);
        if current.contains(&episode_id) {
            return current;
        }
        current.push(episode_id);
        self.save(key, &current);
        current
    }

    pub(crate) fn toggle(&self, key: &str, episode_id: u32, legacy_keys: &[String]) -> Vec<u32> {
        let mut current = self.load(key, legacy_keys);
        match current.iter().position(|id| *id == episode_id) {
            Some(idx) => {
                current.remove(idx);
            }
            None => current.push(episode_id),
        }
        self.save(key, &current);
        current
    }

    /// Forgets the series' progress, legacy keys included so that a later
    /// `load` cannot migrate them back.
    pub(crate) fn clear(&self, key: &str, legacy_keys: &[String]) -> Vec<u32> {
        if !self.is_available() {
            return Vec::new();
        }
        let keys = std::iter::once(key)
            .chain(legacy_keys.iter().map(String::as_str))
            .filter(|candidate| !candidate.is_empty());
        for candidate in keys {
            if let Err(err) = self.backend.remove_item(candidate) {
                warn!(key = candidate, error = %err, "failed to clear progress");
            }
        }
        Vec::new()
    }
}

/// Only a JSON array made entirely of episode ids counts as progress.
fn parse_ids(raw: &str) -> Option<Vec<u32>> {
    serde_json::from_str::<Vec<u32>>(raw).ok()
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::db::UnavailableStorage;
    use crate::db::memory::{MemoryStorage, ReadOnlyStorage};

    fn legacy() -> Vec<String> {
        vec!["vistos_baybade".to_string()]
    }

    #[test]
    fn load_returns_empty_when_nothing_is_stored() {
        let store = ProgressStore::new(Box::new(MemoryStorage::default()));
        assert!(store.load("vistos_beyblade", &legacy()).is_empty());
    }

    #[test]
    fn load_migrates_first_valid_legacy_value() {
        let storage = Rc::new(MemoryStorage::with_item("vistos_baybade", "[3,1,4]"));
        let store = ProgressStore::new(Box::new(Rc::clone(&storage)));

        assert_eq!(store.load("vistos_beyblade", &legacy()), vec![3, 1, 4]);
        assert_eq!(storage.raw("vistos_beyblade").as_deref(), Some("[3,1,4]"));
        assert_eq!(store.load("vistos_beyblade", &[]), vec![3, 1, 4]);
    }

    #[test]
    fn load_prefers_primary_key_over_legacy() {
        let storage = MemoryStorage::with_item("vistos_baybade", "[9]");
        storage.insert("vistos_beyblade", "[1,2]");
        let store = ProgressStore::new(Box::new(storage));
        assert_eq!(store.load("vistos_beyblade", &legacy()), vec![1, 2]);
    }

    #[test]
    fn load_skips_malformed_values_and_continues() {
        let storage = MemoryStorage::with_item("vistos_beyblade", "{not json");
        storage.insert("older", "[1,\"two\"]");
        storage.insert("oldest", "[7]");
        let store = ProgressStore::new(Box::new(storage));
        let legacy = vec!["older".to_string(), "oldest".to_string()];
        assert_eq!(store.load("vistos_beyblade", &legacy), vec![7]);
    }

    #[test]
    fn load_rejects_non_sequence_values() {
        let storage = MemoryStorage::with_item("vistos", "{\"1\":true}");
        let store = ProgressStore::new(Box::new(storage));
        assert!(store.load("vistos", &[]).is_empty());
    }

    #[test]
    fn empty_primary_array_is_valid_and_stops_fallback() {
        let storage = MemoryStorage::with_item("vistos_beyblade", "[]");
        storage.insert("vistos_baybade", "[5]");
        let store = ProgressStore::new(Box::new(storage));
        assert!(store.load("vistos_beyblade", &legacy()).is_empty());
    }

    #[test]
    fn ensure_marked_appends_once_in_first_insertion_order() {
        let store = ProgressStore::new(Box::new(MemoryStorage::default()));
        for id in [4, 2, 4, 9, 2] {
            store.ensure_marked("vistos", id, &[]);
        }
        assert_eq!(store.load("vistos", &[]), vec![4, 2, 9]);
    }

    #[test]
    fn ensure_marked_skips_write_when_already_present() {
        let storage = Rc::new(MemoryStorage::with_item("vistos", "[1]"));
        let store = ProgressStore::new(Box::new(Rc::clone(&storage)));
        assert_eq!(store.ensure_marked("vistos", 1, &[]), vec![1]);
        assert_eq!(storage.writes.get(), 0);

        store.ensure_marked("vistos", 2, &[]);
        assert_eq!(storage.writes.get(), 1);
    }

    #[test]
    fn toggle_twice_restores_membership_and_appends_readded_id() {
        let store = ProgressStore::new(Box::new(MemoryStorage::with_item("vistos", "[1,2,3]")));
        assert_eq!(store.toggle("vistos", 2, &[]), vec![1, 3]);
        assert_eq!(store.toggle("vistos", 2, &[]), vec![1, 3, 2]);
    }

    #[test]
    fn clear_removes_primary_and_legacy_keys() {
        let storage = Rc::new(MemoryStorage::with_item("vistos_beyblade", "[1,2]"));
        storage.insert("vistos_baybade", "[5]");
        let store = ProgressStore::new(Box::new(Rc::clone(&storage)));

        assert!(store.clear("vistos_beyblade", &legacy()).is_empty());
        assert_eq!(storage.raw("vistos_beyblade"), None);
        assert_eq!(storage.raw("vistos_baybade"), None);
        assert!(store.load("vistos_beyblade", &legacy()).is_empty());
    }

    #[test]
    fn clear_on_rejecting_backend_is_swallowed() {
        let storage = ReadOnlyStorage::default();
        storage.inner.insert("vistos", "[1]");
        let store = ProgressStore::new(Box::new(storage));
        assert!(store.clear("vistos", &[]).is_empty());
        assert_eq!(store.load("vistos", &[]), vec![1]);
    }

    #[test]
    fn rejected_writes_are_swallowed() {
        let storage = ReadOnlyStorage::default();
        storage.inner.insert("vistos", "[1]");
        let store = ProgressStore::new(Box::new(storage));
        assert_eq!(store.ensure_marked("vistos", 2, &[]), vec![1, 2]);
        assert_eq!(store.load("vistos", &[]), vec![1]);
    }

    #[test]
    fn unavailable_backend_degrades_to_empty_progress() {
        let store = ProgressStore::new(Box::new(UnavailableStorage));
        assert!(!store.is_available());
        assert!(store.load("vistos", &legacy()).is_empty());
        assert_eq!(store.toggle("vistos", 3, &[]), vec![3]);
        assert!(store.load("vistos", &[]).is_empty());
        assert!(store.updated_at("vistos").is_none());
    }
}
