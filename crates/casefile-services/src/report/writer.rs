use casefile_core::models::UploadReportEntry;
use serde::Serialize;

use super::ReportError;

/// One row of the daily report. Field names are the CSV header.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DailyReportRow<'a> {
    nhs_number: &'a str,
    timestamp: i64,
    date: String,
    upload_status: String,
    file_path: &'a str,
    pds_ods_code: &'a str,
    uploader_ods_code: &'a str,
    failure_reason: &'a str,
}

impl<'a> From<&'a UploadReportEntry> for DailyReportRow<'a> {
    fn from(entry: &'a UploadReportEntry) -> Self {
        Self {
            nhs_number: &entry.nhs_number,
            timestamp: entry.timestamp,
            date: entry.date.to_string(),
            upload_status: entry.upload_status.to_string(),
            file_path: &entry.file_path,
            pds_ods_code: &entry.pds_ods_code,
            uploader_ods_code: &entry.uploader_ods_code,
            failure_reason: entry.failure_reason.as_deref().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryRow<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    description: &'a str,
    count: usize,
}

/// Raw audit rows, one CSV line each.
pub fn daily_report_csv(entries: &[UploadReportEntry]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if entries.is_empty() {
        writer.write_record([
            "NhsNumber",
            "Timestamp",
            "Date",
            "UploadStatus",
            "FilePath",
            "PdsOdsCode",
            "UploaderOdsCode",
            "FailureReason",
        ])?;
    }
    for entry in entries {
        writer.serialize(DailyReportRow::from(entry))?;
    }
    finish(writer)
}

/// `Type,Description,Count` rows.
pub fn summary_csv(rows: &[(String, String, usize)]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(["Type", "Description", "Count"])?;
    }
    for (kind, description, count) in rows {
        writer.serialize(SummaryRow {
            kind,
            description,
            count: *count,
        })?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportError> {
    writer
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_core::models::UploadStatus;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn daily_report_has_fixed_header() {
        let entry = UploadReportEntry {
            id: Uuid::new_v4(),
            nhs_number: "1234567890".to_string(),
            timestamp: 1_700_000_000,
            date: NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            upload_status: UploadStatus::Failed,
            file_path: "/a.pdf, /b.pdf".to_string(),
            pds_ods_code: String::new(),
            uploader_ods_code: "Y12345".to_string(),
            failure_reason: Some("Incorrect file name format".to_string()),
        };
        let csv = String::from_utf8(daily_report_csv(&[entry]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("NhsNumber,Timestamp,Date,UploadStatus,FilePath,PdsOdsCode,UploaderOdsCode,FailureReason")
        );
        assert_eq!(
            lines.next(),
            Some("1234567890,1700000000,2023-11-14,failed,\"/a.pdf, /b.pdf\",,Y12345,Incorrect file name format")
        );
    }

    #[test]
    fn empty_reports_still_carry_headers() {
        let csv = String::from_utf8(daily_report_csv(&[]).unwrap()).unwrap();
        assert!(csv.starts_with("NhsNumber,"));
        let csv = String::from_utf8(summary_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv, "Type,Description,Count\n");
    }

    #[test]
    fn summary_rows_serialize_in_order() {
        let rows = vec![("Total".to_string(), "Total Successful".to_string(), 3)];
        let csv = String::from_utf8(summary_csv(&rows).unwrap()).unwrap();
        assert_eq!(csv, "Type,Description,Count\nTotal,Total Successful,3\n");
    }
}
