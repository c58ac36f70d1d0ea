mod local;
pub mod media;
pub mod upload;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use self::local::LocalStorage;
pub use self::upload::Upload;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

/// Blob store for uploaded media. Paths are relative, `/`-separated and
/// generated by the store itself.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `dir` with a fresh name; returns the relative path.
    async fn put(&self, dir: &str, extension: &str, data: Bytes) -> Result<String, StorageError>;

    /// Remove a stored blob. Missing blobs are not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL for a stored path.
    fn url(&self, path: &str) -> String;
}

/// Relative path with no traversal, absolute or empty segments.
pub(crate) fn check_path(path: &str) -> Result<(), StorageError> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}
