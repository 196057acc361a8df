//! Fault-injecting storage wrapper

use async_trait::async_trait;
use casefile_storage::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::{Arc, Mutex};

/// Delegates to an inner storage, failing chosen operations on demand.
#[derive(Clone)]
pub struct FailingStorage {
    inner: Arc<dyn Storage>,
    copies: Arc<Mutex<usize>>,
    /// Fail the copy with this 1-based sequence number.
    fail_on_copy: Arc<Mutex<Option<usize>>>,
    fail_tag_reads: Arc<Mutex<bool>>,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            copies: Arc::new(Mutex::new(0)),
            fail_on_copy: Arc::new(Mutex::new(None)),
            fail_tag_reads: Arc::new(Mutex::new(false)),
        }
    }

    pub fn fail_on_copy(&self, nth: usize) {
        *self.fail_on_copy.lock().unwrap() = Some(nth);
    }

    pub fn fail_tag_reads(&self) {
        *self.fail_tag_reads.lock().unwrap() = true;
    }

    pub fn copies(&self) -> usize {
        *self.copies.lock().unwrap()
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.inner.put(bucket, key, data, content_type).await
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StorageResult<()> {
        let attempt = {
            let mut copies = self.copies.lock().unwrap();
            *copies += 1;
            *copies
        };
        if *self.fail_on_copy.lock().unwrap() == Some(attempt) {
            return Err(StorageError::CopyFailed(format!(
                "injected failure copying {}",
                source_key
            )));
        }
        self.inner
            .copy(source_bucket, source_key, dest_bucket, dest_key)
            .await
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.inner.delete(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.inner.exists(bucket, key).await
    }

    async fn get_tag(
        &self,
        bucket: &str,
        key: &str,
        tag_key: &str,
    ) -> StorageResult<Option<String>> {
        if *self.fail_tag_reads.lock().unwrap() {
            return Err(StorageError::BackendError("injected tag read failure".to_string()));
        }
        self.inner.get_tag(bucket, key, tag_key).await
    }

    async fn put_tag(
        &self,
        bucket: &str,
        key: &str,
        tag_key: &str,
        value: &str,
    ) -> StorageResult<()> {
        self.inner.put_tag(bucket, key, tag_key, value).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
