use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{check_path, Storage, StorageError};

/// Stores blobs on the local filesystem; the router serves `root` at `/storage`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/storage", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, dir: &str, extension: &str, data: Bytes) -> Result<String, StorageError> {
        check_path(dir)?;
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidPath(format!("{}/*.{}", dir, extension)));
        }

        let relative = format!("{}/{}.{}", dir, uuid::Uuid::now_v7(), extension);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;

        tracing::debug!("Stored {} ({} bytes)", relative, data.len());
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        check_path(path)?;
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path)
    }
}
