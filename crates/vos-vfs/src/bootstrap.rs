//! Filesystem bootstrap.
//!
//! Restores a previously serialized namespace at kernel startup and
//! guarantees the default message of the day exists.

use crate::memory::MemoryVfs;
use crate::storage::{load_namespace, KvStore};

/// Path of the message-of-the-day file.
pub const MOTD_PATH: &str = "/etc/motd";

/// Default welcome text written on first boot.
pub const DEFAULT_MOTD: &str = "Welcome to vos. Type 'help' in the shell to get started.\n";

/// Build the boot namespace: restore from the store when serialized data
/// exists under `key`, otherwise start empty. Either way, a missing
/// `/etc/motd` is filled with the default welcome string.
///
/// A corrupt store entry is treated as absent; boot never fails on bad
/// persisted data.
pub fn bootstrap<S: KvStore>(store: &S, key: &str, now: u64) -> MemoryVfs {
    let mut vfs = match load_namespace(store, key) {
        Ok(Some(map)) => MemoryVfs::from_map(map),
        Ok(None) | Err(_) => MemoryVfs::new(),
    };
    ensure_motd(&mut vfs, now);
    vfs
}

/// Write the default `/etc/motd` if the path is missing.
pub fn ensure_motd(vfs: &mut MemoryVfs, now: u64) {
    if !vfs.exists(MOTD_PATH) {
        vfs.write(MOTD_PATH, DEFAULT_MOTD, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{save_namespace, MemoryStore};

    #[test]
    fn test_bootstrap_empty_store_writes_motd() {
        let store = MemoryStore::new();
        let vfs = bootstrap(&store, "vos.vfs", 50);

        assert_eq!(vfs.read(MOTD_PATH), Some(DEFAULT_MOTD));
        assert_eq!(vfs.get(MOTD_PATH).unwrap().created_at, 50);
    }

    #[test]
    fn test_bootstrap_restores_namespace() {
        let mut vfs = MemoryVfs::new();
        vfs.write("/home/notes.txt", "remember", 10);
        vfs.write(MOTD_PATH, "custom motd", 10);

        let mut store = MemoryStore::new();
        save_namespace(&vfs, &mut store, "vos.vfs").unwrap();

        let restored = bootstrap(&store, "vos.vfs", 999);
        assert_eq!(restored.read("/home/notes.txt"), Some("remember"));
        // A present motd is kept, not overwritten.
        assert_eq!(restored.read(MOTD_PATH), Some("custom motd"));
    }

    #[test]
    fn test_bootstrap_restored_namespace_missing_motd() {
        let mut vfs = MemoryVfs::new();
        vfs.write("/data", "x", 10);

        let mut store = MemoryStore::new();
        save_namespace(&vfs, &mut store, "vos.vfs").unwrap();

        let restored = bootstrap(&store, "vos.vfs", 77);
        assert_eq!(restored.read(MOTD_PATH), Some(DEFAULT_MOTD));
    }

    #[test]
    fn test_bootstrap_corrupt_store_starts_fresh() {
        let mut store = MemoryStore::new();
        store.put("vos.vfs", String::from("{broken"));

        let vfs = bootstrap(&store, "vos.vfs", 0);
        assert_eq!(vfs.file_count(), 1);
        assert!(vfs.exists(MOTD_PATH));
    }
}
