//! Shared key layouts.
//!
//! - permanent documents: `{nhs_number}/{document_id}`
//! - archived manifests: `metadata/{YYYY-MM-DD}/metadata_{HH-MM-SS}.csv`
//! - reports: `bulk-upload-reports/{date}/{ods}/...` and `bulk-upload-reports/{date}/summary_{date}.csv`

use casefile_core::constants::{MANIFEST_ARCHIVE_PREFIX, REPORT_PREFIX};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub fn permanent_document_key(nhs_number: &str, document_id: Uuid) -> String {
    format!("{}/{}", nhs_number, document_id)
}

pub fn manifest_archive_key(at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/metadata_{}.csv",
        MANIFEST_ARCHIVE_PREFIX,
        at.format("%Y-%m-%d"),
        at.format("%H-%M-%S")
    )
}

pub fn daily_report_key(date: NaiveDate, ods_code: &str) -> String {
    format!("{}/{}/{}/daily_report_{}.csv", REPORT_PREFIX, date, ods_code, date)
}

pub fn ods_summary_key(date: NaiveDate, ods_code: &str) -> String {
    format!("{}/{}/{}/ods_summary_{}.csv", REPORT_PREFIX, date, ods_code, date)
}

pub fn summary_key(date: NaiveDate) -> String {
    format!("{}/{}/summary_{}.csv", REPORT_PREFIX, date, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn archive_key_is_dated() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 7, 8, 9).unwrap();
        assert_eq!(
            manifest_archive_key(at),
            "metadata/2024-01-05/metadata_07-08-09.csv"
        );
    }

    #[test]
    fn report_keys_are_ods_scoped() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            daily_report_key(date, "Y12345"),
            "bulk-upload-reports/2024-01-05/Y12345/daily_report_2024-01-05.csv"
        );
        assert_eq!(
            summary_key(date),
            "bulk-upload-reports/2024-01-05/summary_2024-01-05.csv"
        );
    }
}
