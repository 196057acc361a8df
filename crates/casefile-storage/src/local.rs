use crate::traits::{validate_bucket, validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Directory holding tag sidecars, next to the bucket directories.
const TAGS_DIR: &str = ".tags";

/// Local filesystem storage implementation
///
/// Each bucket is a subdirectory of `base_path`. Object tags are kept as JSON
/// sidecars under `base_path/.tags/{bucket}/{key}.json`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert bucket and key to a filesystem path with traversal checks.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self.base_path.join(bucket).join(key))
    }

    fn tag_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self
            .base_path
            .join(TAGS_DIR)
            .join(bucket)
            .join(format!("{}.json", key)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_tags(&self, bucket: &str, key: &str) -> StorageResult<BTreeMap<String, String>> {
        let path = self.tag_path(bucket, key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read(&path).await?;
        serde_json::from_slice(&raw).map_err(|e| {
            StorageError::BackendError(format!(
                "Corrupt tag sidecar {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn write_tags(
        &self,
        bucket: &str,
        key: &str,
        tags: &BTreeMap<String, String>,
    ) -> StorageResult<()> {
        let path = self.tag_path(bucket, key)?;
        self.ensure_parent_dir(&path).await?;
        let raw = serde_json::to_vec(tags)
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        fs::write(&path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        Ok(data)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StorageResult<()> {
        let from_path = self.object_path(source_bucket, source_key)?;
        let to_path = self.object_path(dest_bucket, dest_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!(
                "{}/{}",
                source_bucket, source_key
            )));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::CopyFailed(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        // Tags travel with the object, as with an S3 server-side copy.
        let tags = self.read_tags(source_bucket, source_key).await?;
        if !tags.is_empty() {
            self.write_tags(dest_bucket, dest_key, &tags).await?;
        }

        tracing::info!(
            source_bucket = %source_bucket,
            source_key = %source_key,
            dest_bucket = %dest_bucket,
            dest_key = %dest_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage copy successful"
        );

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        let tag_path = self.tag_path(bucket, key)?;
        if fs::try_exists(&tag_path).await.unwrap_or(false) {
            fs::remove_file(&tag_path).await?;
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let path = self.object_path(bucket, key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn get_tag(
        &self,
        bucket: &str,
        key: &str,
        tag_key: &str,
    ) -> StorageResult<Option<String>> {
        if !self.exists(bucket, key).await? {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }
        let mut tags = self.read_tags(bucket, key).await?;
        Ok(tags.remove(tag_key))
    }

    async fn put_tag(
        &self,
        bucket: &str,
        key: &str,
        tag_key: &str,
        value: &str,
    ) -> StorageResult<()> {
        if !self.exists(bucket, key).await? {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }
        let mut tags = self.read_tags(bucket, key).await?;
        tags.insert(tag_key.to_string(), value.to_string());
        self.write_tags(bucket, key, &tags).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let data = b"%PDF-1.4 test".to_vec();
        storage
            .put("staging", "1234567890/1of1.pdf", data.clone(), "application/pdf")
            .await
            .unwrap();

        let downloaded = storage.get("staging", "1234567890/1of1.pdf").await.unwrap();
        assert_eq!(data, downloaded);
        assert!(dir.path().join("staging/1234567890/1of1.pdf").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.get("staging", "../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("staging", "../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("../staging", "file.pdf").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.delete("staging", "nonexistent/file.pdf").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cross_bucket_copy_keeps_source_and_tags() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .put("staging", "a.pdf", b"content".to_vec(), "application/pdf")
            .await
            .unwrap();
        storage
            .put_tag("staging", "a.pdf", "scan-result", "Clean")
            .await
            .unwrap();

        storage
            .copy("staging", "a.pdf", "permanent", "1234567890/doc")
            .await
            .unwrap();

        assert!(storage.exists("staging", "a.pdf").await.unwrap());
        assert_eq!(
            storage.get("permanent", "1234567890/doc").await.unwrap(),
            b"content".to_vec()
        );
        assert_eq!(
            storage
                .get_tag("permanent", "1234567890/doc", "scan-result")
                .await
                .unwrap()
                .as_deref(),
            Some("Clean")
        );
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.copy("staging", "missing.pdf", "permanent", "x").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tag_absent_vs_object_missing() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .put("staging", "untagged.pdf", b"x".to_vec(), "application/pdf")
            .await
            .unwrap();

        let absent = storage
            .get_tag("staging", "untagged.pdf", "scan-result")
            .await
            .unwrap();
        assert!(absent.is_none());

        let missing = storage.get_tag("staging", "nope.pdf", "scan-result").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_tag_sidecar() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .put("staging", "a.pdf", b"x".to_vec(), "application/pdf")
            .await
            .unwrap();
        storage
            .put_tag("staging", "a.pdf", "scan-result", "Infected")
            .await
            .unwrap();
        storage.delete("staging", "a.pdf").await.unwrap();

        assert!(!dir.path().join(".tags/staging/a.pdf.json").exists());
        assert!(!storage.exists("staging", "a.pdf").await.unwrap());
    }
}
