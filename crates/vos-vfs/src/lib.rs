//! vos-vfs — the in-memory file namespace for the vos kernel.
//!
//! The namespace is a flat map from absolute path strings to text files
//! with creation/modification timestamps. There are no directories as
//! first-class objects; a path is just a key. Content is addressed by
//! character position (the unit every descriptor, read, and write counts
//! in).
//!
//! Module organization:
//!
//! - `path` — canonicalization (rooting, `.`/`..` resolution)
//! - `types` — `FileEntry` and the `FileStat` listing row
//! - `memory` — `MemoryVfs`, the namespace itself
//! - `storage` — `KvStore` trait and the JSON persistence contract
//! - `bootstrap` — restore-at-startup and the default `/etc/motd`
//! - `error` — `VfsError`

pub mod bootstrap;
pub mod error;
pub mod memory;
pub mod path;
pub mod storage;
pub mod types;

pub use bootstrap::{bootstrap, ensure_motd, DEFAULT_MOTD, MOTD_PATH};
pub use error::VfsError;
pub use memory::MemoryVfs;
pub use path::canonicalize;
pub use storage::{load_namespace, save_namespace, KvStore, MemoryStore};
pub use types::{FileEntry, FileStat, PREVIEW_CHARS};
