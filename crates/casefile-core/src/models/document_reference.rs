use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DOCUMENT_ID_NAMESPACE;

/// Permanent metadata row for one stored document.
///
/// Written with `uploaded = false` while a patient's set is in flight and flipped
/// to `true` once every row of the set has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub id: Uuid,
    pub nhs_number: String,
    pub file_name: String,
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub current_gp_ods: String,
    pub uploader_ods: String,
    pub scan_date: String,
    pub virus_scanner_result: String,
    pub uploaded: bool,
    pub created_at: DateTime<Utc>,
}

impl DocumentReference {
    /// Deterministic id so that re-running a patient's transfer targets the same
    /// destination key and metadata row.
    pub fn document_id(nhs_number: &str, stored_file_name: &str) -> Uuid {
        Uuid::new_v5(
            &DOCUMENT_ID_NAMESPACE,
            format!("{}/{}", nhs_number, stored_file_name).as_bytes(),
        )
    }

    /// `s3://bucket/key` style location.
    pub fn file_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}
