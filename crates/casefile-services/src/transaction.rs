//! Transactional mover
//!
//! Moves one patient's admitted set from the staging store into the permanent
//! store as a unit:
//!
//! 1. copy every object staging -> permanent;
//! 2. write one `DocumentReference` row per file (`uploaded = false`);
//! 3. mark every row uploaded;
//! 4. delete the staging originals.
//!
//! A failure in steps 1-3 rolls back copied objects first, then written rows,
//! and leaves staging untouched. Document ids and permanent keys are derived
//! from the patient and file name. A file whose document is already committed
//! (row uploaded and object present) is kept as stored: it is neither copied
//! nor rewritten, so a rollback never reaches an earlier commit. Its staging
//! original is still deleted once the transaction commits.

use std::sync::Arc;
use std::time::Instant;

use casefile_core::constants::PDF_MIME_TYPE;
use casefile_core::models::{DocumentReference, StagingMetadata, VirusScanVerdict};
use casefile_core::AppError;
use casefile_db::DocumentReferenceRepositoryTrait;
use casefile_storage::keys::permanent_document_key;
use casefile_storage::{Storage, StorageError};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Failed to copy {source_key} to permanent storage: {error}")]
    Copy {
        source_key: String,
        #[source]
        error: StorageError,
    },

    #[error("Failed to write document metadata for {file_name}: {error}")]
    Metadata {
        file_name: String,
        #[source]
        error: AppError,
    },

    #[error("Failed to commit document metadata: {0}")]
    Commit(#[source] AppError),

    #[error("Failed to look up stored document {key}: {error}")]
    Lookup {
        key: String,
        #[source]
        error: AppError,
    },
}

/// What one patient's transaction has done so far. Each list grows only after
/// its step succeeded; rollback undoes exactly what is listed. `source_keys`
/// also holds originals of already-stored documents, which are only cleaned up.
#[derive(Debug, Default)]
pub struct TransactionContext {
    nhs_number: String,
    metadata_ids: Vec<Uuid>,
    source_keys: Vec<String>,
    dest_keys: Vec<String>,
}

impl TransactionContext {
    pub fn nhs_number(&self) -> &str {
        &self.nhs_number
    }

    pub fn copied_keys(&self) -> &[String] {
        &self.dest_keys
    }

    pub fn written_ids(&self) -> &[Uuid] {
        &self.metadata_ids
    }
}

#[derive(Clone)]
pub struct TransactionalMover {
    storage: Arc<dyn Storage>,
    documents: Arc<dyn DocumentReferenceRepositoryTrait>,
    staging_bucket: String,
    permanent_bucket: String,
}

impl TransactionalMover {
    pub fn new(
        storage: Arc<dyn Storage>,
        documents: Arc<dyn DocumentReferenceRepositoryTrait>,
        staging_bucket: impl Into<String>,
        permanent_bucket: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            documents,
            staging_bucket: staging_bucket.into(),
            permanent_bucket: permanent_bucket.into(),
        }
    }

    /// Fresh tracking state for one patient.
    pub fn init_transaction(&self, nhs_number: &str) -> TransactionContext {
        TransactionContext {
            nhs_number: nhs_number.to_string(),
            ..TransactionContext::default()
        }
    }

    /// Copies one staged object into the permanent store and records it.
    pub async fn copy(
        &self,
        context: &mut TransactionContext,
        source_key: &str,
        dest_key: &str,
    ) -> Result<(), TransactionError> {
        self.storage
            .copy(&self.staging_bucket, source_key, &self.permanent_bucket, dest_key)
            .await
            .map_err(|error| TransactionError::Copy {
                source_key: source_key.to_string(),
                error,
            })?;

        context.source_keys.push(source_key.to_string());
        context.dest_keys.push(dest_key.to_string());
        tracing::debug!(source_key = %source_key, dest_key = %dest_key, "Object copied");
        Ok(())
    }

    /// The committed document for `id`, if its row is uploaded and its
    /// permanent object is still present.
    async fn stored_document(&self, id: Uuid, key: &str) -> Result<Option<DocumentReference>, AppError> {
        let Some(reference) = self.documents.find_by_id(id).await? else {
            return Ok(None);
        };
        if !reference.uploaded {
            return Ok(None);
        }
        let present = self
            .storage
            .exists(&self.permanent_bucket, key)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(present.then_some(reference))
    }

    /// True when every file of the set is already a committed document, as
    /// after a redelivery of a set whose transaction already committed.
    pub async fn is_committed(&self, staging: &StagingMetadata) -> Result<bool, AppError> {
        for file in &staging.files {
            let id = DocumentReference::document_id(&staging.nhs_number, &file.stored_file_name);
            let key = permanent_document_key(&staging.nhs_number, id);
            if self.stored_document(id, &key).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(!staging.files.is_empty())
    }

    async fn write_metadata(
        &self,
        context: &mut TransactionContext,
        reference: &DocumentReference,
    ) -> Result<(), TransactionError> {
        self.documents
            .put(reference)
            .await
            .map_err(|error| TransactionError::Metadata {
                file_name: reference.file_name.clone(),
                error,
            })?;

        context.metadata_ids.push(reference.id);
        Ok(())
    }

    /// Undoes a failed transaction: copied objects first, then metadata rows.
    /// Staging originals are never touched. Individual failures are logged and
    /// do not stop the rest of the rollback.
    pub async fn rollback(&self, context: TransactionContext) {
        tracing::warn!(
            nhs_number = %context.nhs_number,
            objects = context.dest_keys.len(),
            metadata_rows = context.metadata_ids.len(),
            "Rolling back transaction"
        );

        for dest_key in &context.dest_keys {
            if let Err(e) = self.storage.delete(&self.permanent_bucket, dest_key).await {
                tracing::error!(
                    error = %e,
                    bucket = %self.permanent_bucket,
                    key = %dest_key,
                    "Failed to delete copied object during rollback"
                );
            }
        }

        for id in &context.metadata_ids {
            if let Err(e) = self.documents.delete(*id).await {
                tracing::error!(
                    error = %e,
                    document_id = %id,
                    "Failed to delete document metadata during rollback"
                );
            }
        }
    }

    /// Deletes the staging originals of a committed transaction.
    async fn cleanup_staging(&self, context: TransactionContext) {
        for source_key in &context.source_keys {
            if let Err(e) = self.storage.delete(&self.staging_bucket, source_key).await {
                tracing::warn!(
                    error = %e,
                    bucket = %self.staging_bucket,
                    key = %source_key,
                    "Failed to delete staging original after commit"
                );
            }
        }
    }

    /// Runs the whole transaction for one admitted set. Returns the committed rows.
    #[tracing::instrument(skip(self, staging), fields(nhs_number = %staging.nhs_number, files = staging.files.len()))]
    pub async fn transfer(
        &self,
        staging: &StagingMetadata,
        current_gp_ods: &str,
    ) -> Result<Vec<DocumentReference>, TransactionError> {
        let start = Instant::now();
        let mut context = self.init_transaction(&staging.nhs_number);

        match self.run(&mut context, staging, current_gp_ods).await {
            Ok(references) => {
                self.cleanup_staging(context).await;
                tracing::info!(
                    documents = references.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
                Ok(references)
            }
            Err(e) => {
                tracing::error!(error = %e, "Transaction failed");
                self.rollback(context).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        context: &mut TransactionContext,
        staging: &StagingMetadata,
        current_gp_ods: &str,
    ) -> Result<Vec<DocumentReference>, TransactionError> {
        let now = Utc::now();
        let mut references = Vec::with_capacity(staging.files.len());
        let mut stored = Vec::new();

        for file in &staging.files {
            let id = DocumentReference::document_id(&staging.nhs_number, &file.stored_file_name);
            let key = permanent_document_key(&staging.nhs_number, id);

            let existing = self
                .stored_document(id, &key)
                .await
                .map_err(|error| TransactionError::Lookup {
                    key: key.clone(),
                    error,
                })?;
            if let Some(reference) = existing {
                tracing::info!(document_id = %id, key = %key, "Document already stored, keeping committed copy");
                context.source_keys.push(file.staging_key().to_string());
                stored.push(reference);
                continue;
            }

            self.copy(context, file.staging_key(), &key).await?;

            references.push(DocumentReference {
                id,
                nhs_number: staging.nhs_number.clone(),
                file_name: file.stored_base_name().to_string(),
                bucket: self.permanent_bucket.clone(),
                key,
                content_type: PDF_MIME_TYPE.to_string(),
                current_gp_ods: current_gp_ods.to_string(),
                uploader_ods: file.gp_practice_code.clone(),
                scan_date: file.scan_date.clone(),
                virus_scanner_result: VirusScanVerdict::Clean.to_string(),
                uploaded: false,
                created_at: now,
            });
        }

        for reference in &references {
            self.write_metadata(context, reference).await?;
        }

        let ids: Vec<Uuid> = references.iter().map(|r| r.id).collect();
        if !ids.is_empty() {
            self.documents
                .mark_uploaded(&ids)
                .await
                .map_err(TransactionError::Commit)?;
        }

        for reference in &mut references {
            reference.uploaded = true;
        }
        references.extend(stored);
        Ok(references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{file_metadata, lloyd_george_path, MockDocumentReferenceRepository};
    use casefile_storage::LocalStorage;

    async fn setup() -> (tempfile::TempDir, Arc<dyn Storage>, Arc<MockDocumentReferenceRepository>) {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
        (dir, storage, Arc::new(MockDocumentReferenceRepository::new()))
    }

    #[tokio::test]
    async fn copy_records_only_successful_steps() {
        let (_dir, storage, documents) = setup().await;
        let mover = TransactionalMover::new(storage.clone(), documents, "staging", "permanent");
        storage
            .put("staging", "1234567890/a.pdf", b"pdf".to_vec(), PDF_MIME_TYPE)
            .await
            .unwrap();

        let mut context = mover.init_transaction("1234567890");
        mover
            .copy(&mut context, "1234567890/a.pdf", "1234567890/doc-a")
            .await
            .unwrap();
        assert!(mover
            .copy(&mut context, "1234567890/missing.pdf", "1234567890/doc-b")
            .await
            .is_err());

        assert_eq!(context.copied_keys(), ["1234567890/doc-a".to_string()]);

        mover.rollback(context).await;
        assert!(!storage.exists("permanent", "1234567890/doc-a").await.unwrap());
        assert!(storage.exists("staging", "1234567890/a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn committed_transfer_marks_rows_and_clears_staging() {
        let (_dir, storage, documents) = setup().await;
        let mover = TransactionalMover::new(storage.clone(), documents.clone(), "staging", "permanent");

        let files = vec![
            file_metadata(&lloyd_george_path(1, 2, "Jane Smith", "1234567890"), "1234567890", "Y12345"),
            file_metadata(&lloyd_george_path(2, 2, "Jane Smith", "1234567890"), "1234567890", "Y12345"),
        ];
        for file in &files {
            storage
                .put("staging", file.staging_key(), b"pdf".to_vec(), PDF_MIME_TYPE)
                .await
                .unwrap();
        }
        let staging = StagingMetadata::new("1234567890", files.clone());

        let references = mover.transfer(&staging, "Y12345").await.unwrap();

        assert_eq!(references.len(), 2);
        for (reference, file) in references.iter().zip(&files) {
            assert!(reference.uploaded);
            assert_eq!(reference.key, format!("1234567890/{}", reference.id));
            assert!(storage.exists("permanent", &reference.key).await.unwrap());
            assert!(!storage.exists("staging", file.staging_key()).await.unwrap());
            assert!(documents.get(reference.id).unwrap().uploaded);
        }
    }

    #[tokio::test]
    async fn failed_reupload_keeps_earlier_commit() {
        let (_dir, storage, documents) = setup().await;
        let mover = TransactionalMover::new(storage.clone(), documents.clone(), "staging", "permanent");

        let files = vec![
            file_metadata(&lloyd_george_path(1, 2, "Jane Smith", "1234567890"), "1234567890", "Y12345"),
            file_metadata(&lloyd_george_path(2, 2, "Jane Smith", "1234567890"), "1234567890", "Y12345"),
        ];
        let staging = StagingMetadata::new("1234567890", files.clone());
        for file in &files {
            storage
                .put("staging", file.staging_key(), b"pdf".to_vec(), PDF_MIME_TYPE)
                .await
                .unwrap();
        }
        let first = mover.transfer(&staging, "Y12345").await.unwrap();

        // Second file lost its row, so only it is written again; that write fails.
        documents.delete(first[1].id).await.unwrap();
        for file in &files {
            storage
                .put("staging", file.staging_key(), b"pdf".to_vec(), PDF_MIME_TYPE)
                .await
                .unwrap();
        }
        documents.fail_on_put(3);

        let result = mover.transfer(&staging, "Y12345").await;

        assert!(matches!(result, Err(TransactionError::Metadata { .. })));
        assert!(storage.exists("permanent", &first[0].key).await.unwrap());
        assert!(documents.get(first[0].id).unwrap().uploaded);
        assert!(documents.get(first[1].id).is_none());
        for file in &files {
            assert!(storage.exists("staging", file.staging_key()).await.unwrap());
        }
    }

    #[tokio::test]
    async fn committed_set_is_kept_and_staging_cleared() {
        let (_dir, storage, documents) = setup().await;
        let mover = TransactionalMover::new(storage.clone(), documents.clone(), "staging", "permanent");

        let file = file_metadata(&lloyd_george_path(1, 1, "Jane Smith", "1234567890"), "1234567890", "Y12345");
        let staging = StagingMetadata::new("1234567890", vec![file.clone()]);
        assert!(!mover.is_committed(&staging).await.unwrap());

        storage
            .put("staging", file.staging_key(), b"first".to_vec(), PDF_MIME_TYPE)
            .await
            .unwrap();
        let first = mover.transfer(&staging, "Y12345").await.unwrap();
        assert!(mover.is_committed(&staging).await.unwrap());

        storage
            .put("staging", file.staging_key(), b"second".to_vec(), PDF_MIME_TYPE)
            .await
            .unwrap();
        let second = mover.transfer(&staging, "Y12345").await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert!(second[0].uploaded);
        assert_eq!(storage.get("permanent", &first[0].key).await.unwrap(), b"first".to_vec());
        assert!(!storage.exists("staging", file.staging_key()).await.unwrap());
    }
}
