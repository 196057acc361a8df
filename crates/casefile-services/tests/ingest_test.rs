//! Manifest ingest integration tests.
//!
//! Run with: `cargo test -p casefile-services --test ingest_test`

mod helpers;

use casefile_core::models::StagingMetadata;
use casefile_core::AppError;
use casefile_services::test_helpers::{lloyd_george_path, manifest_csv, manifest_row, MockQueue};
use helpers::{TestPipeline, MANIFEST_KEY, STAGING_BUCKET};

#[tokio::test]
async fn test_two_file_patient_dispatched_as_one_message() {
    let pipeline = TestPipeline::new().await;
    let first = lloyd_george_path(1, 2, "Jane Smith", "1234567890");
    let second = lloyd_george_path(2, 2, "Jane Smith", "1234567890");
    pipeline
        .put_manifest(manifest_csv(&[
            manifest_row(&first, "1234567890", "Y12345"),
            manifest_row(&second, "1234567890", "Y12345"),
        ]))
        .await;

    let summary = pipeline.ingest_service().process_manifest().await.unwrap();

    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.patients_dispatched, 1);
    assert_eq!(summary.patients_failed, 0);
    assert!(summary.group_id.starts_with("bulk_upload_"));

    let sent = pipeline.queue.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].group_id, summary.group_id);
    assert_eq!(
        sent[0].attributes.get("nhs_number").map(String::as_str),
        Some("1234567890")
    );

    let staging: StagingMetadata = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(staging.nhs_number, "1234567890");
    let paths: Vec<&str> = staging.files.iter().map(|f| f.file_path.as_str()).collect();
    assert_eq!(paths, vec![first.as_str(), second.as_str()]);
    assert!(pipeline.reports.entries().is_empty());
}

#[tokio::test]
async fn test_bad_nhs_number_in_file_name_fails_patient_without_dispatch() {
    let pipeline = TestPipeline::new().await;
    let bad = "/1234567890/1of1_Lloyd_George_Record_[Jane Smith]_[12345]_[01-01-2000].pdf";
    let good = lloyd_george_path(1, 1, "John Doe", "9876543210");
    pipeline
        .put_manifest(manifest_csv(&[
            manifest_row(bad, "1234567890", "Y12345"),
            manifest_row(&good, "9876543210", "Y12345"),
        ]))
        .await;

    let summary = pipeline.ingest_service().process_manifest().await.unwrap();

    assert_eq!(summary.patients_dispatched, 1);
    assert_eq!(summary.patients_failed, 1);

    let sent = pipeline.queue.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].attributes.get("nhs_number").map(String::as_str),
        Some("9876543210")
    );

    let failed = pipeline.reports.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].nhs_number, "1234567890");
    assert_eq!(failed[0].uploader_ods_code, "Y12345");
    assert!(failed[0]
        .failure_reason
        .as_deref()
        .unwrap()
        .starts_with("Incorrect file name format"));
}

#[tokio::test]
async fn test_later_rows_of_failed_patient_are_skipped() {
    let pipeline = TestPipeline::new().await;
    let first = lloyd_george_path(1, 2, "Jane Smith", "1234567890");
    let second = lloyd_george_path(2, 2, "Jane Smith", "1234567890");
    pipeline
        .put_manifest(manifest_csv(&[
            manifest_row(&first, "1234567890", "Y12345"),
            manifest_row("/1234567890/notes.docx", "1234567890", "Y12345"),
            manifest_row(&second, "1234567890", "Y12345"),
        ]))
        .await;

    let summary = pipeline.ingest_service().process_manifest().await.unwrap();

    assert_eq!(summary.patients_dispatched, 0);
    assert!(pipeline.queue.sent().is_empty());

    let failed = pipeline.reports.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_path, first);
}

#[tokio::test]
async fn test_malformed_manifest_aborts_before_any_side_effect() {
    let pipeline = TestPipeline::new().await;
    let path = lloyd_george_path(1, 1, "Jane Smith", "1234567890");
    let mut csv = manifest_csv(&[manifest_row(&path, "1234567890", "Y12345")]);
    csv.push_str("only,three,fields\n");
    pipeline.put_manifest(csv).await;

    let result = pipeline.ingest_service().process_manifest().await;

    assert!(matches!(result, Err(AppError::MalformedManifest(_))));
    assert!(pipeline.queue.sent().is_empty());
    assert!(pipeline.reports.entries().is_empty());
    assert!(pipeline.staged(MANIFEST_KEY).await);
}

#[tokio::test]
async fn test_manifest_archived_and_original_deleted() {
    let pipeline = TestPipeline::new().await;
    let path = lloyd_george_path(1, 1, "Jane Smith", "1234567890");
    let manifest = manifest_csv(&[manifest_row(&path, "1234567890", "Y12345")]);
    pipeline.put_manifest(manifest.clone()).await;

    let summary = pipeline.ingest_service().process_manifest().await.unwrap();

    assert!(summary.archived_manifest_key.starts_with("metadata/"));
    assert!(!pipeline.staged(MANIFEST_KEY).await);
    let archived = pipeline
        .storage()
        .get(STAGING_BUCKET, &summary.archived_manifest_key)
        .await
        .unwrap();
    assert_eq!(archived, manifest.into_bytes());
}

#[tokio::test]
async fn test_missing_manifest_is_not_found() {
    let pipeline = TestPipeline::new().await;

    let result = pipeline.ingest_service().process_manifest().await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_queue_failure_keeps_manifest_in_place() {
    let pipeline = TestPipeline::with_queue(MockQueue::failing_after(1)).await;
    pipeline
        .put_manifest(manifest_csv(&[
            manifest_row(
                &lloyd_george_path(1, 1, "Jane Smith", "1234567890"),
                "1234567890",
                "Y12345",
            ),
            manifest_row(
                &lloyd_george_path(1, 1, "John Doe", "9876543210"),
                "9876543210",
                "Y12345",
            ),
        ]))
        .await;

    let result = pipeline.ingest_service().process_manifest().await;

    assert!(matches!(result, Err(AppError::Queue(_))));
    assert_eq!(pipeline.queue.sent().len(), 1);
    assert!(pipeline.staged(MANIFEST_KEY).await);
}
