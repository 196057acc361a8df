//! Test harness: wires the pipeline services over a temporary local object
//! store and the in-memory repositories.
//!
//! Run from workspace root: `cargo test -p casefile-services`.

#![allow(dead_code)]

use std::sync::Arc;

use casefile_core::constants::VIRUS_SCAN_TAG_KEY;
use casefile_services::test_helpers::{
    FailingStorage, FixedPatientDirectory, MockDocumentReferenceRepository, MockQueue,
    MockUploadReportRepository,
};
use casefile_services::{
    BulkUploadHandler, Dispatcher, IngestService, ReportService, Storage, TransactionalMover,
    VirusScanGate,
};
use casefile_storage::LocalStorage;
use tempfile::TempDir;

pub const STAGING_BUCKET: &str = "staging";
pub const PERMANENT_BUCKET: &str = "permanent";
pub const REPORTS_BUCKET: &str = "reports";
pub const MANIFEST_KEY: &str = "metadata.csv";
pub const MAX_SCAN_ATTEMPTS: u32 = 3;

/// Every collaborator of the pipeline, with handles on the mocks for assertions.
pub struct TestPipeline {
    pub storage: FailingStorage,
    pub documents: MockDocumentReferenceRepository,
    pub reports: MockUploadReportRepository,
    pub directory: FixedPatientDirectory,
    pub queue: MockQueue,
    pub _temp_dir: TempDir,
}

impl TestPipeline {
    pub async fn new() -> Self {
        Self::with_queue(MockQueue::new()).await
    }

    pub async fn with_queue(queue: MockQueue) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let local = LocalStorage::new(temp_dir.path())
            .await
            .expect("Failed to create local storage");
        Self {
            storage: FailingStorage::new(Arc::new(local)),
            documents: MockDocumentReferenceRepository::new(),
            reports: MockUploadReportRepository::new(),
            directory: FixedPatientDirectory::new(),
            queue,
            _temp_dir: temp_dir,
        }
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::new(self.storage.clone())
    }

    pub fn ingest_service(&self) -> IngestService {
        IngestService::new(
            self.storage(),
            Arc::new(self.reports.clone()),
            Dispatcher::new(Arc::new(self.queue.clone())),
            STAGING_BUCKET,
            MANIFEST_KEY,
        )
    }

    pub fn handler(&self) -> BulkUploadHandler {
        let gate = VirusScanGate::new(self.storage(), STAGING_BUCKET);
        let mover = TransactionalMover::new(
            self.storage(),
            Arc::new(self.documents.clone()),
            STAGING_BUCKET,
            PERMANENT_BUCKET,
        );
        BulkUploadHandler::new(
            Arc::new(self.reports.clone()),
            Arc::new(self.directory.clone()),
            gate,
            mover,
            MAX_SCAN_ATTEMPTS,
        )
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.storage(), Arc::new(self.reports.clone()), REPORTS_BUCKET)
    }

    /// Stages one PDF under its manifest path, optionally with a scan verdict.
    pub async fn stage(&self, path: &str, verdict: Option<&str>) {
        let key = path.trim_start_matches('/');
        self.storage
            .put(STAGING_BUCKET, key, b"%PDF-1.4 test".to_vec(), "application/pdf")
            .await
            .expect("Failed to stage object");
        if let Some(verdict) = verdict {
            self.storage
                .put_tag(STAGING_BUCKET, key, VIRUS_SCAN_TAG_KEY, verdict)
                .await
                .expect("Failed to tag object");
        }
    }

    pub async fn put_manifest(&self, csv: String) {
        self.storage
            .put(STAGING_BUCKET, MANIFEST_KEY, csv.into_bytes(), "text/csv")
            .await
            .expect("Failed to write manifest");
    }

    pub async fn staged(&self, path: &str) -> bool {
        self.storage
            .exists(STAGING_BUCKET, path.trim_start_matches('/'))
            .await
            .expect("Failed to check staging object")
    }

    pub async fn permanent(&self, key: &str) -> bool {
        self.storage
            .exists(PERMANENT_BUCKET, key)
            .await
            .expect("Failed to check permanent object")
    }

    pub async fn read_report(&self, key: &str) -> String {
        let bytes = self
            .storage
            .get(REPORTS_BUCKET, key)
            .await
            .expect("Report not written");
        String::from_utf8(bytes).expect("Report is not UTF-8")
    }
}
