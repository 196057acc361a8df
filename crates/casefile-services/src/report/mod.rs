//! Bulk upload reports
//!
//! Reads the audit log for a time window and writes, to the reports bucket:
//! a raw daily report and a summary per uploading practice, plus one summary
//! across every practice.

mod aggregator;
mod writer;

use std::sync::Arc;
use std::time::Instant;

use casefile_core::models::UploadReportEntry;
use casefile_core::AppError;
use casefile_db::UploadReportRepositoryTrait;
use casefile_storage::keys::{daily_report_key, ods_summary_key, summary_key};
use casefile_storage::{Storage, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

pub use aggregator::{normalize_reason, OdsReport, PatientDay, PatientFailure, SummaryReport};
pub use writer::{daily_report_csv, summary_csv};

const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to read audit log: {0}")]
    Database(#[from] AppError),

    #[error("Failed to write report {key}: {error}")]
    Storage {
        key: String,
        #[source]
        error: StorageError,
    },

    #[error("Failed to render report CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Keys written by one report run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub uploaders: usize,
    pub keys_written: Vec<String>,
}

#[derive(Clone)]
pub struct ReportService {
    storage: Arc<dyn Storage>,
    reports: Arc<dyn UploadReportRepositoryTrait>,
    reports_bucket: String,
}

impl ReportService {
    pub fn new(
        storage: Arc<dyn Storage>,
        reports: Arc<dyn UploadReportRepositoryTrait>,
        reports_bucket: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            reports,
            reports_bucket: reports_bucket.into(),
        }
    }

    /// Builds the report for one uploader over `[start, end)`.
    pub async fn ods_report(
        &self,
        uploader_ods_code: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(OdsReport, Vec<UploadReportEntry>), ReportError> {
        let entries = self
            .reports
            .scan_window_all(start, end, Some(uploader_ods_code))
            .await?;
        let report = OdsReport::from_entries(uploader_ods_code, &entries);
        Ok((report, entries))
    }

    /// Generates and writes every report for the `window` ending at `end`.
    /// Output keys are dated by the window end.
    #[tracing::instrument(skip(self), fields(bucket = %self.reports_bucket))]
    pub async fn generate(
        &self,
        end: DateTime<Utc>,
        window: Duration,
    ) -> Result<ReportOutcome, ReportError> {
        let start_time = Instant::now();
        let start = end - window;
        let date = end.date_naive();

        let uploaders = self.reports.list_uploaders(start, end).await?;
        let mut ods_reports = Vec::with_capacity(uploaders.len());
        let mut keys_written = Vec::new();

        for ods_code in &uploaders {
            let (report, entries) = self.ods_report(ods_code, start, end).await?;

            let key = daily_report_key(date, ods_code);
            self.write(&key, daily_report_csv(&entries)?).await?;
            keys_written.push(key);

            let key = ods_summary_key(date, ods_code);
            self.write(&key, summary_csv(&report.summary_rows())?).await?;
            keys_written.push(key);

            tracing::debug!(
                ods_code = %ods_code,
                entries = entries.len(),
                successful = report.successful_count(),
                failed = report.failed_count(),
                "Practice report written"
            );
            ods_reports.push(report);
        }

        let summary = SummaryReport::from_reports(&ods_reports);
        let key = summary_key(date);
        self.write(&key, summary_csv(&summary.summary_rows())?).await?;
        keys_written.push(key);

        tracing::info!(
            uploaders = uploaders.len(),
            successful = summary.total_successful.len(),
            failed = summary.failures.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Bulk upload reports generated"
        );

        Ok(ReportOutcome {
            window_start: start,
            window_end: end,
            uploaders: uploaders.len(),
            keys_written,
        })
    }

    async fn write(&self, key: &str, data: Vec<u8>) -> Result<(), ReportError> {
        self.storage
            .put(&self.reports_bucket, key, data, CSV_CONTENT_TYPE)
            .await
            .map_err(|error| ReportError::Storage {
                key: key.to_string(),
                error,
            })
    }
}
