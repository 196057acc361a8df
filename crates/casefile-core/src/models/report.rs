use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::file_metadata::{join_file_paths, FileMetadata, StagingMetadata};

/// Outcome of one patient upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Complete,
    Failed,
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Complete => write!(f, "complete"),
            UploadStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "complete" => Ok(UploadStatus::Complete),
            "failed" => Ok(UploadStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// Append-only audit row, one per patient per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReportEntry {
    pub id: Uuid,
    pub nhs_number: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub date: NaiveDate,
    pub upload_status: UploadStatus,
    pub file_path: String,
    /// Registered practice from the patient directory, or one of the SUSP/DECE/REST sentinels.
    pub pds_ods_code: String,
    pub uploader_ods_code: String,
    pub failure_reason: Option<String>,
}

impl UploadReportEntry {
    pub fn complete(staging: &StagingMetadata, pds_ods_code: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nhs_number: staging.nhs_number.clone(),
            timestamp: at.timestamp(),
            date: at.date_naive(),
            upload_status: UploadStatus::Complete,
            file_path: staging.joined_file_paths(),
            pds_ods_code: pds_ods_code.to_string(),
            uploader_ods_code: staging.uploader_ods_code().to_string(),
            failure_reason: None,
        }
    }

    pub fn failed(
        nhs_number: &str,
        files: &[FileMetadata],
        uploader_ods_code: &str,
        pds_ods_code: Option<&str>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            nhs_number: nhs_number.to_string(),
            timestamp: at.timestamp(),
            date: at.date_naive(),
            upload_status: UploadStatus::Failed,
            file_path: join_file_paths(files),
            pds_ods_code: pds_ods_code.unwrap_or_default().to_string(),
            uploader_ods_code: uploader_ods_code.to_string(),
            failure_reason: Some(reason.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.upload_status == UploadStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn failed_entry_carries_reason_and_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let entry = UploadReportEntry::failed("1234567890", &[], "Y12345", None, "bad name", at);
        assert_eq!(entry.upload_status, UploadStatus::Failed);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(entry.timestamp, at.timestamp());
        assert_eq!(entry.failure_reason.as_deref(), Some("bad name"));
        assert_eq!(entry.pds_ods_code, "");
        assert!(!entry.is_complete());
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("FAILED".parse::<UploadStatus>().unwrap(), UploadStatus::Failed);
        assert_eq!(UploadStatus::Complete.to_string(), "complete");
    }
}
