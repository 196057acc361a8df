//! Manifest ingest
//!
//! One run per manifest: read the whole CSV from the staging store, group it
//! per patient, write a `failed` audit row for every patient whose files could
//! not be resolved, dispatch the rest, then archive the manifest under a dated
//! key and delete the original.
//!
//! A structurally broken manifest aborts the run before any audit row, message
//! or archive is written.

use std::sync::Arc;
use std::time::Instant;

use casefile_core::models::UploadReportEntry;
use casefile_core::AppError;
use casefile_db::UploadReportRepositoryTrait;
use casefile_processing::{group_manifest_rows, read_manifest};
use casefile_storage::keys::manifest_archive_key;
use casefile_storage::Storage;
use chrono::Utc;
use serde::Serialize;

use crate::dispatcher::Dispatcher;

/// Outcome of one ingest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub patients_dispatched: usize,
    pub patients_failed: usize,
    pub group_id: String,
    pub archived_manifest_key: String,
}

#[derive(Clone)]
pub struct IngestService {
    storage: Arc<dyn Storage>,
    reports: Arc<dyn UploadReportRepositoryTrait>,
    dispatcher: Dispatcher,
    staging_bucket: String,
    manifest_key: String,
}

impl IngestService {
    pub fn new(
        storage: Arc<dyn Storage>,
        reports: Arc<dyn UploadReportRepositoryTrait>,
        dispatcher: Dispatcher,
        staging_bucket: impl Into<String>,
        manifest_key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            reports,
            dispatcher,
            staging_bucket: staging_bucket.into(),
            manifest_key: manifest_key.into(),
        }
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.staging_bucket, key = %self.manifest_key))]
    pub async fn process_manifest(&self) -> Result<IngestSummary, AppError> {
        let start = Instant::now();

        let bytes = self
            .storage
            .get(&self.staging_bucket, &self.manifest_key)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::NotFound(format!("Manifest {} not found", self.manifest_key))
                } else {
                    AppError::Storage(e.to_string())
                }
            })?;

        let rows = read_manifest(&bytes).map_err(|e| {
            tracing::error!(error = %e, "Manifest rejected, nothing dispatched");
            AppError::from(e)
        })?;
        let rows_read = rows.len();

        let (patients, failed) = group_manifest_rows(rows).into_outcome();

        let now = Utc::now();
        for patient in &failed {
            let entry = UploadReportEntry::failed(
                &patient.nhs_number,
                &patient.files,
                &patient.ods_code,
                None,
                patient.reason.clone(),
                now,
            );
            self.reports.append(&entry).await?;
            tracing::info!(
                nhs_number = %patient.nhs_number,
                reason = %patient.reason,
                files_grouped = patient.files.len(),
                "Patient rejected during ingest"
            );
        }

        let receipt = self.dispatcher.dispatch(&patients).await?;

        let archived_manifest_key = self.archive_manifest().await?;

        let summary = IngestSummary {
            rows_read,
            patients_dispatched: receipt.messages_sent,
            patients_failed: failed.len(),
            group_id: receipt.group_id,
            archived_manifest_key,
        };

        tracing::info!(
            rows_read = summary.rows_read,
            patients_dispatched = summary.patients_dispatched,
            patients_failed = summary.patients_failed,
            group_id = %summary.group_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Manifest ingest complete"
        );
        Ok(summary)
    }

    /// Copies the manifest to its dated archive key, then deletes the original.
    async fn archive_manifest(&self) -> Result<String, AppError> {
        let archive_key = manifest_archive_key(Utc::now());

        self.storage
            .copy(
                &self.staging_bucket,
                &self.manifest_key,
                &self.staging_bucket,
                &archive_key,
            )
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.storage
            .delete(&self.staging_bucket, &self.manifest_key)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        tracing::debug!(archive_key = %archive_key, "Manifest archived");
        Ok(archive_key)
    }
}
