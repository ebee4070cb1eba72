//! Core types for the VFS layer.

use serde::{Deserialize, Serialize};

/// Number of leading characters exposed in a listing preview.
pub const PREVIEW_CHARS: usize = 72;

/// A file in the namespace.
///
/// Content is text; every position and size in the VFS counts
/// characters, not bytes. Timestamps are logical kernel time in
/// milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Canonical absolute path (primary key)
    pub path: String,

    /// File content
    pub content: String,

    /// Creation timestamp
    pub created_at: u64,

    /// Last modification timestamp
    pub updated_at: u64,
}

impl FileEntry {
    /// Create a new entry.
    pub fn new(path: String, content: String, now: u64) -> Self {
        Self {
            path,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Content length in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Listing row returned by `MemoryVfs::list`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStat {
    /// Canonical absolute path
    pub path: String,

    /// Size in characters
    pub size: usize,

    /// First `PREVIEW_CHARS` characters of content
    pub preview: String,
}

impl From<&FileEntry> for FileStat {
    fn from(entry: &FileEntry) -> Self {
        Self {
            path: entry.path.clone(),
            size: entry.len(),
            preview: entry.content.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_len_counts_chars() {
        let entry = FileEntry::new(String::from("/a"), String::from("héllo"), 10);
        assert_eq!(entry.len(), 5);
        assert!(!entry.is_empty());
    }

    #[test]
    fn test_stat_from_entry() {
        let entry = FileEntry::new(String::from("/a"), String::from("hello world"), 10);
        let stat = FileStat::from(&entry);
        assert_eq!(stat.path, "/a");
        assert_eq!(stat.size, 11);
        assert_eq!(stat.preview, "hello world");
    }

    #[test]
    fn test_stat_preview_truncates() {
        let long: String = core::iter::repeat('x').take(200).collect();
        let entry = FileEntry::new(String::from("/big"), long, 0);
        let stat = FileStat::from(&entry);
        assert_eq!(stat.preview.chars().count(), PREVIEW_CHARS);
        assert_eq!(stat.size, 200);
    }
}
