//! Per-patient grouping of manifest rows
//!
//! Rows are folded, in manifest order, into groups keyed by
//! `(nhs_number, gp_practice_code)`. Group order is first-seen order and file
//! order within a group is manifest order.
//!
//! A row that cannot be resolved fails its patient for the whole batch: the
//! group keeps only the files accepted before the bad row, and later rows for
//! that patient are skipped.

use std::collections::HashMap;

use casefile_core::models::{FileMetadata, StagingMetadata};

use crate::filename::resolve_file_path;
use crate::manifest::ManifestRow;

/// Reason recorded for a row without an NHS number.
pub const MISSING_NHS_NUMBER: &str = "Missing NHS number in manifest";

/// A patient excluded from dispatch, with whatever was grouped before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPatient {
    pub nhs_number: String,
    pub ods_code: String,
    pub files: Vec<FileMetadata>,
    pub reason: String,
}

#[derive(Debug)]
struct PatientGroup {
    nhs_number: String,
    ods_code: String,
    files: Vec<FileMetadata>,
    failure: Option<String>,
}

/// Ordered map of patient groups.
#[derive(Debug, Default)]
pub struct PatientGroups {
    groups: Vec<PatientGroup>,
    index: HashMap<(String, String), usize>,
}

impl PatientGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, nhs_number: &str, ods_code: &str) -> &mut PatientGroup {
        let key = (nhs_number.to_string(), ods_code.to_string());
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.groups.push(PatientGroup {
                    nhs_number: key.0.clone(),
                    ods_code: key.1.clone(),
                    files: Vec::new(),
                    failure: None,
                });
                let position = self.groups.len() - 1;
                self.index.insert(key, position);
                position
            }
        };
        &mut self.groups[position]
    }

    /// Appends a resolved file to its patient's group. Returns `false` when the
    /// patient has already failed in this batch and the file was dropped.
    pub fn push(&mut self, file: FileMetadata) -> bool {
        let group = self.entry(&file.nhs_number, &file.gp_practice_code);
        if group.failure.is_some() {
            return false;
        }
        group.files.push(file);
        true
    }

    /// Marks a patient failed. The first failure wins.
    pub fn fail(&mut self, nhs_number: &str, ods_code: &str, reason: impl Into<String>) {
        let group = self.entry(nhs_number, ods_code);
        if group.failure.is_none() {
            group.failure = Some(reason.into());
        }
    }

    pub fn is_failed(&self, nhs_number: &str, ods_code: &str) -> bool {
        self.index
            .get(&(nhs_number.to_string(), ods_code.to_string()))
            .map(|&i| self.groups[i].failure.is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Splits into patients to dispatch and patients to report as failed,
    /// both in first-seen order.
    pub fn into_outcome(self) -> (Vec<StagingMetadata>, Vec<FailedPatient>) {
        let mut dispatch = Vec::new();
        let mut failed = Vec::new();
        for group in self.groups {
            match group.failure {
                None if !group.files.is_empty() => {
                    dispatch.push(StagingMetadata::new(group.nhs_number, group.files))
                }
                None => {}
                Some(reason) => failed.push(FailedPatient {
                    nhs_number: group.nhs_number,
                    ods_code: group.ods_code,
                    files: group.files,
                    reason,
                }),
            }
        }
        (dispatch, failed)
    }
}

/// Resolves every row's filename and folds the rows into patient groups.
pub fn group_manifest_rows(rows: Vec<ManifestRow>) -> PatientGroups {
    rows.into_iter().fold(PatientGroups::new(), |mut groups, row| {
        if groups.is_failed(&row.nhs_number, &row.gp_practice_code) {
            tracing::debug!(line = row.line, "Skipping row for failed patient");
            return groups;
        }

        if row.nhs_number.is_empty() {
            tracing::warn!(line = row.line, "Manifest row has no NHS number");
            groups.fail(&row.nhs_number, &row.gp_practice_code, MISSING_NHS_NUMBER);
            return groups;
        }

        match resolve_file_path(&row.file_path) {
            Ok(stored_file_name) => {
                groups.push(row.into_file_metadata(stored_file_name));
            }
            Err(error) => {
                tracing::warn!(
                    line = row.line,
                    nhs_number = %row.nhs_number,
                    error = %error,
                    "Rejecting patient: file name could not be resolved"
                );
                groups.fail(&row.nhs_number, &row.gp_practice_code, error.to_string());
            }
        }
        groups
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: u64, path: &str, nhs: &str, ods: &str) -> ManifestRow {
        ManifestRow {
            line,
            file_path: path.to_string(),
            page_count: "1".to_string(),
            gp_practice_code: ods.to_string(),
            nhs_number: nhs.to_string(),
            section: "LG".to_string(),
            sub_section: String::new(),
            scan_date: "03/09/2022".to_string(),
            scan_id: "NEC".to_string(),
            user_id: "NEC".to_string(),
            upload_date: "04/09/2022".to_string(),
        }
    }

    fn lg(n: u32, m: u32, nhs: &str) -> String {
        format!(
            "/{}/{}of{}_Lloyd_George_Record_[Jane Smith]_[{}]_[01-01-2000].pdf",
            nhs, n, m, nhs
        )
    }

    #[test]
    fn rows_group_per_patient_in_manifest_order() {
        let rows = vec![
            row(2, &lg(1, 2, "1234567890"), "1234567890", "Y12345"),
            row(3, &lg(1, 1, "9876543210"), "9876543210", "Y12345"),
            row(4, &lg(2, 2, "1234567890"), "1234567890", "Y12345"),
        ];
        let (dispatch, failed) = group_manifest_rows(rows).into_outcome();
        assert!(failed.is_empty());
        assert_eq!(dispatch.len(), 2);
        assert_eq!(dispatch[0].nhs_number, "1234567890");
        assert_eq!(dispatch[0].files.len(), 2);
        assert!(dispatch[0].files[0].file_path.contains("1of2"));
        assert!(dispatch[0].files[1].file_path.contains("2of2"));
        assert_eq!(dispatch[1].nhs_number, "9876543210");
    }

    #[test]
    fn same_patient_from_two_practices_forms_two_groups() {
        let rows = vec![
            row(2, &lg(1, 1, "1234567890"), "1234567890", "Y12345"),
            row(3, &lg(1, 1, "1234567890"), "1234567890", "A99999"),
        ];
        let (dispatch, _) = group_manifest_rows(rows).into_outcome();
        assert_eq!(dispatch.len(), 2);
        assert_eq!(dispatch[1].uploader_ods_code(), "A99999");
    }

    #[test]
    fn malformed_names_are_normalized_before_grouping() {
        let rows = vec![row(
            2,
            "/1234567890/1 of 1 lloyd george record [jane smith] [1234567890] [1-1-2000].pdf",
            "1234567890",
            "Y12345",
        )];
        let (dispatch, _) = group_manifest_rows(rows).into_outcome();
        assert_eq!(
            dispatch[0].files[0].stored_file_name,
            "/1234567890/1of1_Lloyd_George_Record_[Jane Smith]_[1234567890]_[01-01-2000].pdf"
        );
        assert_eq!(
            dispatch[0].files[0].file_path,
            "/1234567890/1 of 1 lloyd george record [jane smith] [1234567890] [1-1-2000].pdf"
        );
    }

    #[test]
    fn bad_row_fails_patient_and_keeps_earlier_files() {
        let rows = vec![
            row(2, &lg(1, 3, "1234567890"), "1234567890", "Y12345"),
            row(3, "/1234567890/scan_without_number.pdf", "1234567890", "Y12345"),
            row(4, &lg(3, 3, "1234567890"), "1234567890", "Y12345"),
            row(5, &lg(1, 1, "9876543210"), "9876543210", "Y12345"),
        ];
        let (dispatch, failed) = group_manifest_rows(rows).into_outcome();

        assert_eq!(dispatch.len(), 1);
        assert_eq!(dispatch[0].nhs_number, "9876543210");

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].nhs_number, "1234567890");
        assert_eq!(failed[0].files.len(), 1);
        assert!(failed[0].files[0].file_path.contains("1of3"));
        assert!(failed[0].reason.starts_with("Incorrect file name format"));
    }

    #[test]
    fn first_row_failure_leaves_no_files() {
        let rows = vec![row(2, "/x/garbage.pdf", "1234567890", "Y12345")];
        let (dispatch, failed) = group_manifest_rows(rows).into_outcome();
        assert!(dispatch.is_empty());
        assert_eq!(failed.len(), 1);
        assert!(failed[0].files.is_empty());
    }

    #[test]
    fn missing_nhs_number_fails_row() {
        let rows = vec![row(2, &lg(1, 1, "1234567890"), "", "Y12345")];
        let (dispatch, failed) = group_manifest_rows(rows).into_outcome();
        assert!(dispatch.is_empty());
        assert_eq!(failed[0].reason, MISSING_NHS_NUMBER);
    }
}
