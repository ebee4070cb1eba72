//! Persistence contract for the file namespace.
//!
//! The namespace serializes as a `path -> FileEntry` JSON object into a
//! durable key/value store chosen by the host. The kernel itself only
//! ever sees the `KvStore` trait.

use std::collections::BTreeMap;

use crate::error::VfsError;
use crate::memory::MemoryVfs;
use crate::types::FileEntry;

/// A durable string key/value store.
///
/// Hosts back this with whatever they have (browser local storage, a
/// file, a database row). `MemoryStore` is the in-process implementation
/// used by tests and by hosts that do not persist.
pub trait KvStore {
    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: String);
}

/// In-memory `KvStore` implementation.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.entries.insert(String::from(key), value);
    }
}

/// Serialize the namespace under `key` in the given store.
pub fn save_namespace<S: KvStore>(
    vfs: &MemoryVfs,
    store: &mut S,
    key: &str,
) -> Result<(), VfsError> {
    let json = serde_json::to_string(&vfs.to_map())
        .map_err(|e| VfsError::storage(format!("serialize namespace: {}", e)))?;
    store.put(key, json);
    Ok(())
}

/// Load a previously serialized namespace from the store.
///
/// Returns `Ok(None)` when the store has nothing under `key`.
pub fn load_namespace<S: KvStore>(
    store: &S,
    key: &str,
) -> Result<Option<BTreeMap<String, FileEntry>>, VfsError> {
    match store.get(key) {
        None => Ok(None),
        Some(json) => {
            let map = serde_json::from_str(&json)
                .map_err(|e| VfsError::storage(format!("deserialize namespace: {}", e)))?;
            Ok(Some(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.put("k", String::from("v"));
        assert_eq!(store.get("k"), Some(String::from("v")));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut vfs = MemoryVfs::new();
        vfs.write("/etc/motd", "hi", 10);
        vfs.write("/tmp/x", "data", 20);

        let mut store = MemoryStore::new();
        save_namespace(&vfs, &mut store, "vos.vfs").unwrap();

        let map = load_namespace(&store, "vos.vfs").unwrap().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["/etc/motd"].content, "hi");
        assert_eq!(map["/tmp/x"].created_at, 20);
    }

    #[test]
    fn test_load_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(load_namespace(&store, "nope").unwrap(), None);
    }

    #[test]
    fn test_load_corrupt_data() {
        let mut store = MemoryStore::new();
        store.put("vos.vfs", String::from("not json"));
        assert!(load_namespace(&store, "vos.vfs").is_err());
    }
}
