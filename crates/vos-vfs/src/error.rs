//! Error types for the VFS layer.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors from VFS operations.
///
/// Most namespace operations report absence in-band (`Option`/`bool`);
/// `VfsError` covers the cases that are genuinely exceptional: malformed
/// input and persistence failures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum VfsError {
    /// Path not found
    NotFound,

    /// Invalid path format
    InvalidPath(String),

    /// Persistence backend error
    StorageError(String),
}

impl VfsError {
    /// Create a storage error with message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create an invalid path error with message.
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound)
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::NotFound => write!(f, "path not found"),
            VfsError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
            VfsError::StorageError(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for VfsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let err = VfsError::storage("backend down");
        match err {
            VfsError::StorageError(msg) => assert_eq!(msg, "backend down"),
            _ => panic!("Expected StorageError"),
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(VfsError::NotFound.is_not_found());
        assert!(!VfsError::invalid_path("x").is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            VfsError::invalid_path("empty").to_string(),
            "invalid path: empty"
        );
    }
}
