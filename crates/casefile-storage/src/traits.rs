//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait so the
/// pipeline services can run against either without knowing which one is wired in.
///
/// Missing objects surface as `StorageError::NotFound` from `get`, `copy` and
/// `get_tag`; `delete` of a missing object succeeds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole object.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Write a whole object, replacing any existing one at the key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Server-side copy, possibly across buckets. Overwrites the destination.
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StorageResult<()>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Value of one object tag; `Ok(None)` when the object exists without that tag.
    async fn get_tag(&self, bucket: &str, key: &str, tag_key: &str)
        -> StorageResult<Option<String>>;

    /// Set one object tag, keeping the others.
    async fn put_tag(
        &self,
        bucket: &str,
        key: &str,
        tag_key: &str,
        value: &str,
    ) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Rejects keys that could escape a bucket or address a different one.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_bucket(bucket: &str) -> StorageResult<()> {
    if bucket.is_empty()
        || bucket.starts_with('.')
        || bucket.contains('/')
        || bucket.contains('\\')
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name: {}",
            bucket
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_and_absolute_keys_rejected() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("1234567890/1of2.pdf").is_ok());
    }

    #[test]
    fn bucket_names_cannot_nest() {
        assert!(validate_bucket("staging").is_ok());
        assert!(validate_bucket("a/b").is_err());
        assert!(validate_bucket(".tags").is_err());
    }
}
