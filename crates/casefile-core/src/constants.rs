//! Constants shared across the pipeline.

/// Object tag written by the antivirus scanner onto staged objects.
pub const VIRUS_SCAN_TAG_KEY: &str = "scan-result";

/// The only MIME type admitted into permanent storage.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Record-type marker embedded in every canonical filename.
pub const LLOYD_GEORGE_MARKER: &str = "Lloyd_George_Record";

/// Default key of the manifest inside the staging store.
pub const DEFAULT_MANIFEST_KEY: &str = "metadata.csv";

/// Prefix under which processed manifests are archived in the staging store.
pub const MANIFEST_ARCHIVE_PREFIX: &str = "metadata";

/// Prefix under which generated reports are written.
pub const REPORT_PREFIX: &str = "bulk-upload-reports";

/// Prefix of the message group id shared by every message of one dispatch run.
pub const MESSAGE_GROUP_PREFIX: &str = "bulk_upload_";

/// Message attribute carrying the patient's NHS number.
pub const NHS_NUMBER_ATTRIBUTE: &str = "nhs_number";

/// Sentinel ODS codes returned by the patient directory instead of a practice code.
pub const ODS_SUSPENDED: &str = "SUSP";
pub const ODS_DECEASED: &str = "DECE";
pub const ODS_RESTRICTED: &str = "REST";

/// Namespace for deterministic document ids (UUIDv5 over `nhs_number/stored_file_name`).
pub const DOCUMENT_ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x6c0f_4d3e_8a51_4f7b_9c2e_1b7d_5e3a_0f42);

/// Namespace for queue deduplication ids (UUIDv5 over the serialized staging metadata).
pub const DEDUPLICATION_ID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_u128(0x2a9e_71c4_05d8_4b6a_b3f1_8e42_c7d0_961b);
