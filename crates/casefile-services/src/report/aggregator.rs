//! Report aggregation over the audit log
//!
//! Patient counts are kept as sets of `(nhs_number, date)` so repeated
//! attempts for the same patient on the same day count once. Failures keep
//! only each patient's latest attempt, and a patient with any success in the
//! window is not counted as failed at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use casefile_core::constants::{ODS_DECEASED, ODS_RESTRICTED, ODS_SUSPENDED};
use casefile_core::models::UploadReportEntry;
use chrono::NaiveDate;

pub type PatientDay = (String, NaiveDate);

/// A failed patient: `(nhs_number, date, normalised reason)`.
pub type PatientFailure = (String, NaiveDate, String);

/// Reason used when a failed row carries none.
const UNKNOWN_REASON: &str = "Unknown failure";

/// Trims, collapses internal whitespace, drops a trailing full stop and
/// upper-cases the first letter.
pub fn normalize_reason(reason: &str) -> String {
    let collapsed = reason.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.').trim_end();

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => UNKNOWN_REASON.to_string(),
    }
}

/// Statistics for one uploading practice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OdsReport {
    pub uploader_ods_code: String,
    pub total_successful: BTreeSet<PatientDay>,
    pub total_registered_elsewhere: BTreeSet<PatientDay>,
    pub total_suspended: BTreeSet<PatientDay>,
    pub total_deceased: BTreeSet<PatientDay>,
    pub total_restricted: BTreeSet<PatientDay>,
    /// Latest failure per patient, excluding patients with any success.
    pub failures_per_patient: BTreeMap<String, UploadReportEntry>,
    /// Failed patients per normalised reason.
    pub unique_failures: BTreeMap<String, usize>,
}

impl OdsReport {
    pub fn from_entries(uploader_ods_code: &str, entries: &[UploadReportEntry]) -> Self {
        let mut report = OdsReport {
            uploader_ods_code: uploader_ods_code.to_string(),
            ..OdsReport::default()
        };

        let mut latest_failures: HashMap<&str, &UploadReportEntry> = HashMap::new();

        for entry in entries {
            if !entry.is_complete() {
                latest_failures
                    .entry(entry.nhs_number.as_str())
                    .and_modify(|current| {
                        if entry.timestamp > current.timestamp {
                            *current = entry;
                        }
                    })
                    .or_insert(entry);
                continue;
            }

            let day = (entry.nhs_number.clone(), entry.date);
            report.total_successful.insert(day.clone());

            match entry.pds_ods_code.as_str() {
                ODS_SUSPENDED => {
                    report.total_suspended.insert(day);
                }
                ODS_DECEASED => {
                    report.total_deceased.insert(day);
                }
                ODS_RESTRICTED => {
                    report.total_restricted.insert(day);
                }
                pds if !pds.is_empty() && pds != entry.uploader_ods_code => {
                    report.total_registered_elsewhere.insert(day);
                }
                _ => {}
            }
        }

        let succeeded: BTreeSet<&str> = report
            .total_successful
            .iter()
            .map(|(nhs_number, _)| nhs_number.as_str())
            .collect();

        for (nhs_number, entry) in latest_failures {
            if succeeded.contains(nhs_number) {
                continue;
            }
            report
                .failures_per_patient
                .insert(nhs_number.to_string(), entry.clone());
        }

        for entry in report.failures_per_patient.values() {
            let reason = normalize_reason(entry.failure_reason.as_deref().unwrap_or_default());
            *report.unique_failures.entry(reason).or_default() += 1;
        }

        report
    }

    pub fn successful_count(&self) -> usize {
        self.total_successful.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures_per_patient.len()
    }

    /// Failed patients as `(nhs_number, date, reason)` triples.
    pub fn failure_triples(&self) -> BTreeSet<PatientFailure> {
        self.failures_per_patient
            .values()
            .map(|entry| {
                (
                    entry.nhs_number.clone(),
                    entry.date,
                    normalize_reason(entry.failure_reason.as_deref().unwrap_or_default()),
                )
            })
            .collect()
    }

    /// `(type, description, count)` rows of the per-practice summary CSV.
    pub fn summary_rows(&self) -> Vec<(String, String, usize)> {
        let mut rows = totals_rows(
            self.total_successful.len(),
            self.total_registered_elsewhere.len(),
            self.total_suspended.len(),
            self.total_deceased.len(),
            self.total_restricted.len(),
            self.failures_per_patient.len(),
        );
        rows.extend(
            self.unique_failures
                .iter()
                .map(|(reason, count)| ("FailureReason".to_string(), reason.clone(), *count)),
        );
        rows
    }
}

/// Statistics across every practice in the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub total_successful: BTreeSet<PatientDay>,
    pub total_registered_elsewhere: BTreeSet<PatientDay>,
    pub total_suspended: BTreeSet<PatientDay>,
    pub total_deceased: BTreeSet<PatientDay>,
    pub total_restricted: BTreeSet<PatientDay>,
    pub success_per_uploader: BTreeMap<String, usize>,
    /// Failed patients across practices, excluding anyone who succeeded anywhere.
    pub failures: BTreeSet<PatientFailure>,
    pub unique_failures: BTreeMap<String, usize>,
}

impl SummaryReport {
    pub fn from_reports(reports: &[OdsReport]) -> Self {
        let mut summary = SummaryReport::default();

        for report in reports {
            summary.total_successful.extend(report.total_successful.iter().cloned());
            summary
                .total_registered_elsewhere
                .extend(report.total_registered_elsewhere.iter().cloned());
            summary.total_suspended.extend(report.total_suspended.iter().cloned());
            summary.total_deceased.extend(report.total_deceased.iter().cloned());
            summary.total_restricted.extend(report.total_restricted.iter().cloned());
            summary
                .success_per_uploader
                .insert(report.uploader_ods_code.clone(), report.successful_count());
            summary.failures.extend(report.failure_triples());
        }

        let succeeded: BTreeSet<String> = summary
            .total_successful
            .iter()
            .map(|(nhs_number, _)| nhs_number.clone())
            .collect();
        summary
            .failures
            .retain(|(nhs_number, _, _)| !succeeded.contains(nhs_number));

        for (_, _, reason) in &summary.failures {
            *summary.unique_failures.entry(reason.clone()).or_default() += 1;
        }

        summary
    }

    pub fn summary_rows(&self) -> Vec<(String, String, usize)> {
        let mut rows = totals_rows(
            self.total_successful.len(),
            self.total_registered_elsewhere.len(),
            self.total_suspended.len(),
            self.total_deceased.len(),
            self.total_restricted.len(),
            self.failures.len(),
        );
        rows.extend(
            self.success_per_uploader
                .iter()
                .map(|(ods, count)| ("SuccessByOds".to_string(), ods.clone(), *count)),
        );
        rows.extend(
            self.unique_failures
                .iter()
                .map(|(reason, count)| ("FailureReason".to_string(), reason.clone(), *count)),
        );
        rows
    }
}

fn totals_rows(
    successful: usize,
    registered_elsewhere: usize,
    suspended: usize,
    deceased: usize,
    restricted: usize,
    failed: usize,
) -> Vec<(String, String, usize)> {
    [
        ("Total Ingested", successful + failed),
        ("Total Successful", successful),
        ("Successful - Registered Elsewhere", registered_elsewhere),
        ("Successful - Suspended", suspended),
        ("Successful - Deceased", deceased),
        ("Successful - Restricted", restricted),
        ("Total Failed", failed),
    ]
    .into_iter()
    .map(|(description, count)| ("Total".to_string(), description.to_string(), count))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_core::models::UploadStatus;
    use uuid::Uuid;

    fn entry(nhs: &str, ts: i64, day: u32, status: UploadStatus, pds: &str, reason: Option<&str>) -> UploadReportEntry {
        UploadReportEntry {
            id: Uuid::new_v4(),
            nhs_number: nhs.to_string(),
            timestamp: ts,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            upload_status: status,
            file_path: format!("/{}/1of1.pdf", nhs),
            pds_ods_code: pds.to_string(),
            uploader_ods_code: "Y12345".to_string(),
            failure_reason: reason.map(str::to_string),
        }
    }

    #[test]
    fn reasons_normalise_to_one_spelling() {
        assert_eq!(normalize_reason("  incorrect   file name format. "), "Incorrect file name format");
        assert_eq!(normalize_reason("Incorrect file name format"), "Incorrect file name format");
        assert_eq!(normalize_reason(""), UNKNOWN_REASON);
    }

    #[test]
    fn same_patient_same_day_counts_once() {
        let entries = vec![
            entry("1234567890", 100, 1, UploadStatus::Complete, "Y12345", None),
            entry("1234567890", 200, 1, UploadStatus::Complete, "Y12345", None),
            entry("1234567890", 300, 2, UploadStatus::Complete, "Y12345", None),
        ];
        let report = OdsReport::from_entries("Y12345", &entries);
        assert_eq!(report.successful_count(), 2);
    }

    #[test]
    fn success_supersedes_failures() {
        let entries = vec![
            entry("1234567890", 100, 1, UploadStatus::Failed, "", Some("bad name")),
            entry("1234567890", 200, 1, UploadStatus::Complete, "Y12345", None),
            entry("9876543210", 100, 1, UploadStatus::Failed, "", Some("first")),
            entry("9876543210", 300, 1, UploadStatus::Failed, "", Some("latest")),
        ];
        let report = OdsReport::from_entries("Y12345", &entries);
        assert!(!report.failures_per_patient.contains_key("1234567890"));
        assert_eq!(
            report.failures_per_patient["9876543210"].failure_reason.as_deref(),
            Some("latest")
        );
        assert_eq!(report.unique_failures.get("Latest"), Some(&1));
        assert_eq!(report.unique_failures.len(), 1);
    }

    #[test]
    fn sentinels_and_other_practices_are_classified() {
        let entries = vec![
            entry("1111111111", 1, 1, UploadStatus::Complete, "SUSP", None),
            entry("2222222222", 1, 1, UploadStatus::Complete, "DECE", None),
            entry("3333333333", 1, 1, UploadStatus::Complete, "REST", None),
            entry("4444444444", 1, 1, UploadStatus::Complete, "B86041", None),
            entry("5555555555", 1, 1, UploadStatus::Complete, "Y12345", None),
        ];
        let report = OdsReport::from_entries("Y12345", &entries);
        assert_eq!(report.successful_count(), 5);
        assert_eq!(report.total_suspended.len(), 1);
        assert_eq!(report.total_deceased.len(), 1);
        assert_eq!(report.total_restricted.len(), 1);
        assert_eq!(
            report.total_registered_elsewhere.iter().next().map(|(n, _)| n.as_str()),
            Some("4444444444")
        );
    }

    #[test]
    fn summary_dedups_across_practices() {
        let mut other = entry("1234567890", 50, 1, UploadStatus::Complete, "A99999", None);
        other.uploader_ods_code = "A99999".to_string();
        let first = OdsReport::from_entries(
            "Y12345",
            &[
                entry("1234567890", 10, 1, UploadStatus::Complete, "Y12345", None),
                entry("9876543210", 20, 1, UploadStatus::Failed, "", Some("Virus scan failed")),
            ],
        );
        let second = OdsReport::from_entries("A99999", &[other]);

        let summary = SummaryReport::from_reports(&[first, second]);
        assert_eq!(summary.total_successful.len(), 1);
        assert_eq!(summary.success_per_uploader["Y12345"], 1);
        assert_eq!(summary.success_per_uploader["A99999"], 1);
        assert_eq!(summary.failures.len(), 1);

        let rows = summary.summary_rows();
        assert!(rows.contains(&("Total".to_string(), "Total Ingested".to_string(), 2)));
        assert!(rows.contains(&("FailureReason".to_string(), "Virus scan failed".to_string(), 1)));
    }

    #[test]
    fn failure_elsewhere_is_cleared_by_success_in_another_practice() {
        let mut failed = entry("1234567890", 10, 1, UploadStatus::Failed, "", Some("bad"));
        failed.uploader_ods_code = "A99999".to_string();
        let reports = [
            OdsReport::from_entries("A99999", &[failed]),
            OdsReport::from_entries(
                "Y12345",
                &[entry("1234567890", 20, 1, UploadStatus::Complete, "Y12345", None)],
            ),
        ];
        let summary = SummaryReport::from_reports(&reports);
        assert!(summary.failures.is_empty());
    }
}
