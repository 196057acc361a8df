//! Mock repository implementations for testing
//!
//! These mocks allow exercising the services without a database.

use async_trait::async_trait;
use casefile_core::models::{DocumentReference, UploadReportEntry, UploadStatus};
use casefile_core::AppError;
use casefile_db::{
    DocumentReferenceRepositoryTrait, Page, ReportCursor, ReportPage, UploadReportRepositoryTrait,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::patient_directory::PatientDirectory;

/// Mock document reference repository
#[derive(Clone, Default)]
pub struct MockDocumentReferenceRepository {
    rows: Arc<Mutex<HashMap<Uuid, DocumentReference>>>,
    puts: Arc<Mutex<usize>>,
    /// Fail the put with this 1-based sequence number.
    fail_on_put: Arc<Mutex<Option<usize>>>,
    fail_on_mark: Arc<Mutex<bool>>,
}

impl MockDocumentReferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on_put(&self, nth: usize) {
        *self.fail_on_put.lock().unwrap() = Some(nth);
    }

    pub fn fail_on_mark_uploaded(&self) {
        *self.fail_on_mark.lock().unwrap() = true;
    }

    pub fn get(&self, id: Uuid) -> Option<DocumentReference> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentReferenceRepositoryTrait for MockDocumentReferenceRepository {
    async fn put(&self, reference: &DocumentReference) -> Result<(), AppError> {
        let mut puts = self.puts.lock().unwrap();
        *puts += 1;
        if *self.fail_on_put.lock().unwrap() == Some(*puts) {
            return Err(AppError::Internal("injected metadata write failure".to_string()));
        }
        self.rows
            .lock()
            .unwrap()
            .insert(reference.id, reference.clone());
        Ok(())
    }

    async fn mark_uploaded(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        if *self.fail_on_mark.lock().unwrap() {
            return Err(AppError::Internal("injected commit failure".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                row.uploaded = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentReference>, AppError> {
        Ok(self.get(id))
    }

    async fn list_for_patient(
        &self,
        nhs_number: &str,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Page<DocumentReference, Uuid>, AppError> {
        let mut rows: Vec<DocumentReference> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.nhs_number == nhs_number && after.map_or(true, |a| r.id > a))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);

        let limit = limit.max(0) as usize;
        let next = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|r| r.id)
        } else {
            None
        };
        Ok(Page { items: rows, next })
    }
}

/// Mock audit log
#[derive(Clone, Default)]
pub struct MockUploadReportRepository {
    entries: Arc<Mutex<Vec<UploadReportEntry>>>,
    appends: Arc<Mutex<usize>>,
    /// Fail the append with this 1-based sequence number.
    fail_on_append: Arc<Mutex<Option<usize>>>,
}

impl MockUploadReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on_append(&self, nth: usize) {
        *self.fail_on_append.lock().unwrap() = Some(nth);
    }

    pub fn entries(&self) -> Vec<UploadReportEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<UploadReportEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.upload_status == UploadStatus::Failed)
            .collect()
    }

    pub fn completed(&self) -> Vec<UploadReportEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.upload_status == UploadStatus::Complete)
            .collect()
    }
}

#[async_trait]
impl UploadReportRepositoryTrait for MockUploadReportRepository {
    async fn append(&self, entry: &UploadReportEntry) -> Result<(), AppError> {
        let mut appends = self.appends.lock().unwrap();
        *appends += 1;
        if *self.fail_on_append.lock().unwrap() == Some(*appends) {
            return Err(AppError::Internal("injected audit write failure".to_string()));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn scan_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uploader_ods_code: Option<&str>,
        after: Option<ReportCursor>,
        limit: i64,
    ) -> Result<ReportPage, AppError> {
        let (start, end) = (start.timestamp(), end.timestamp());
        let mut rows: Vec<UploadReportEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .filter(|e| uploader_ods_code.map_or(true, |ods| e.uploader_ods_code == ods))
            .filter(|e| after.map_or(true, |c| (e.timestamp, e.id) > (c.timestamp, c.id)))
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.timestamp, e.id));

        let limit = limit.max(0) as usize;
        let next = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|e| ReportCursor {
                timestamp: e.timestamp,
                id: e.id,
            })
        } else {
            None
        };
        Ok(Page { items: rows, next })
    }

    async fn list_uploaders(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let (start, end) = (start.timestamp(), end.timestamp());
        let uploaders: BTreeSet<String> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .map(|e| e.uploader_ods_code.clone())
            .collect();
        Ok(uploaders.into_iter().collect())
    }
}

/// Patient directory answering from a fixed table, falling back to the uploader.
#[derive(Clone, Default)]
pub struct FixedPatientDirectory {
    answers: Arc<Mutex<HashMap<String, String>>>,
}

impl FixedPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, nhs_number: &str, ods_code: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(nhs_number.to_string(), ods_code.to_string());
    }
}

#[async_trait]
impl PatientDirectory for FixedPatientDirectory {
    async fn current_gp_ods(
        &self,
        nhs_number: &str,
        uploader_ods_code: &str,
    ) -> Result<String, AppError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(nhs_number)
            .cloned()
            .unwrap_or_else(|| uploader_ods_code.to_string()))
    }
}
