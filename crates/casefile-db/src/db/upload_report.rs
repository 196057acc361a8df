use casefile_core::models::{UploadReportEntry, UploadStatus};
use casefile_core::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::Page;

const REPORT_PAGE_SIZE: i64 = 500;

/// Keyset position in the audit log: rows are ordered by (timestamp, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCursor {
    pub timestamp: i64,
    pub id: Uuid,
}

pub type ReportPage = Page<UploadReportEntry, ReportCursor>;

/// Trait for audit log operations
#[async_trait::async_trait]
pub trait UploadReportRepositoryTrait: Send + Sync {
    /// Append one audit row. Rows are never updated.
    async fn append(&self, entry: &UploadReportEntry) -> Result<(), AppError>;

    /// One page of rows with `start <= timestamp < end`, optionally for a single uploader.
    async fn scan_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uploader_ods_code: Option<&str>,
        after: Option<ReportCursor>,
        limit: i64,
    ) -> Result<ReportPage, AppError>;

    /// Distinct uploader ODS codes with at least one row in the window.
    async fn list_uploaders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError>;

    /// Every row in the window, following cursors until the last page.
    async fn scan_window_all(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uploader_ods_code: Option<&str>,
    ) -> Result<Vec<UploadReportEntry>, AppError> {
        let mut entries = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .scan_window(start, end, uploader_ods_code, cursor, REPORT_PAGE_SIZE)
                .await?;
            entries.extend(page.items);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }
}

#[derive(sqlx::FromRow)]
struct UploadReportRow {
    id: Uuid,
    nhs_number: String,
    event_timestamp: i64,
    event_date: NaiveDate,
    upload_status: String,
    file_path: String,
    pds_ods_code: String,
    uploader_ods_code: String,
    failure_reason: Option<String>,
}

impl UploadReportRow {
    fn to_entry(self) -> Result<UploadReportEntry, AppError> {
        let upload_status = self
            .upload_status
            .parse::<UploadStatus>()
            .map_err(|e| AppError::Internal(format!("Corrupt audit row {}: {}", self.id, e)))?;

        Ok(UploadReportEntry {
            id: self.id,
            nhs_number: self.nhs_number,
            timestamp: self.event_timestamp,
            date: self.event_date,
            upload_status,
            file_path: self.file_path,
            pds_ods_code: self.pds_ods_code,
            uploader_ods_code: self.uploader_ods_code,
            failure_reason: self.failure_reason,
        })
    }
}

/// Repository for the `bulk_upload_reports` table
#[derive(Clone)]
pub struct UploadReportRepository {
    pool: PgPool,
}

impl UploadReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UploadReportRepositoryTrait for UploadReportRepository {
    #[tracing::instrument(skip(self, entry), fields(
        db.table = "bulk_upload_reports",
        db.operation = "insert",
        nhs_number = %entry.nhs_number,
        upload_status = %entry.upload_status
    ))]
    async fn append(&self, entry: &UploadReportEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO bulk_upload_reports (
                id, nhs_number, event_timestamp, event_date, upload_status,
                file_path, pds_ods_code, uploader_ods_code, failure_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.nhs_number)
        .bind(entry.timestamp)
        .bind(entry.date)
        .bind(entry.upload_status.to_string())
        .bind(&entry.file_path)
        .bind(&entry.pds_ods_code)
        .bind(&entry.uploader_ods_code)
        .bind(&entry.failure_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "bulk_upload_reports", db.operation = "select"))]
    async fn scan_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uploader_ods_code: Option<&str>,
        after: Option<ReportCursor>,
        limit: i64,
    ) -> Result<ReportPage, AppError> {
        let rows = sqlx::query_as::<Postgres, UploadReportRow>(
            r#"
            SELECT id, nhs_number, event_timestamp, event_date, upload_status,
                   file_path, pds_ods_code, uploader_ods_code, failure_reason
            FROM bulk_upload_reports
            WHERE event_timestamp >= $1
              AND event_timestamp < $2
              AND ($3::text IS NULL OR uploader_ods_code = $3)
              AND ($4::bigint IS NULL OR (event_timestamp, id) > ($4, $5))
            ORDER BY event_timestamp ASC, id ASC
            LIMIT $6
            "#,
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .bind(uploader_ods_code)
        .bind(after.map(|c| c.timestamp))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(UploadReportRow::to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let next = if items.len() as i64 == limit {
            items.last().map(|e| ReportCursor {
                timestamp: e.timestamp,
                id: e.id,
            })
        } else {
            None
        };

        Ok(Page { items, next })
    }

    #[tracing::instrument(skip(self), fields(db.table = "bulk_upload_reports", db.operation = "select"))]
    async fn list_uploaders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let codes = sqlx::query_scalar::<Postgres, String>(
            r#"
            SELECT DISTINCT uploader_ods_code
            FROM bulk_upload_reports
            WHERE event_timestamp >= $1 AND event_timestamp < $2
            ORDER BY uploader_ods_code
            "#,
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }
}
