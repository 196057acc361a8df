use std::collections::HashSet;
use std::sync::LazyLock;

use casefile_core::constants::PDF_MIME_TYPE;
use casefile_core::models::{base_name, FileMetadata};
use chrono::NaiveDate;
use regex::Regex;

use super::{FilenameError, ParsedFilename};

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9]+)of([0-9]+)_Lloyd_George_Record_\[(\p{L}+(?: \p{L}+)*)\]_\[([0-9]{10})\]_\[([0-9]{2})-([0-9]{2})-([0-9]{4})\]\.pdf$",
    )
    .expect("valid regex")
});

/// Whether a bare filename (no directory) matches the canonical grammar exactly.
pub fn is_canonical(name: &str) -> bool {
    CANONICAL.is_match(name)
}

/// Fields of a bare filename that must already be canonical.
pub fn parse_canonical(name: &str) -> Result<ParsedFilename, FilenameError> {
    let non_canonical = || FilenameError::NonCanonical(name.to_string());
    let caps = CANONICAL.captures(name).ok_or_else(non_canonical)?;
    let field = |i: usize| caps.get(i).map(|m| m.as_str()).ok_or_else(non_canonical);

    let document_index: u32 = field(1)?.parse().map_err(|_| non_canonical())?;
    let total_documents: u32 = field(2)?.parse().map_err(|_| non_canonical())?;
    let person_name = field(3)?.to_string();
    let nhs_number = field(4)?.to_string();
    let (day, month, year) = (field(5)?, field(6)?, field(7)?);

    let date = match (day.parse::<u32>(), month.parse::<u32>(), year.parse::<i32>()) {
        (Ok(day), Ok(month), Ok(year)) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    }
    .ok_or_else(|| FilenameError::InvalidDate(format!("{}-{}-{}", day, month, year)))?;

    Ok(ParsedFilename {
        document_index,
        total_documents,
        person_name,
        nhs_number,
        date,
    })
}

/// Checks a single resolved path: canonical grammar on its last segment and a
/// PDF content type.
pub fn validate_file_name(file_path: &str) -> Result<ParsedFilename, FilenameError> {
    let name = base_name(file_path);
    let parsed = parse_canonical(name)?;

    let mime = mime_guess::from_path(name).first_raw().unwrap_or_default();
    if mime != PDF_MIME_TYPE {
        return Err(FilenameError::InvalidMimeType(name.to_string()));
    }

    Ok(parsed)
}

/// Checks one patient's whole set of resolved names.
///
/// Every name must be valid on its own; names must be unique; every file must
/// declare the actual number of files in the set, with distinct in-range
/// document numbers; and all files must name the same person and carry the
/// patient's NHS number.
pub fn validate_file_set(
    nhs_number: &str,
    files: &[FileMetadata],
) -> Result<Vec<ParsedFilename>, FilenameError> {
    let mut seen_names = HashSet::new();
    let mut seen_indices = HashSet::new();
    let mut parsed_set: Vec<ParsedFilename> = Vec::with_capacity(files.len());

    for file in files {
        let name = file.stored_base_name();
        let parsed = validate_file_name(&file.stored_file_name)?;

        if !seen_names.insert(name) {
            return Err(FilenameError::DuplicateFileName(name.to_string()));
        }

        if parsed.total_documents as usize != files.len() {
            return Err(FilenameError::FileCountMismatch {
                declared: parsed.total_documents,
                actual: files.len(),
            });
        }

        if parsed.document_index == 0 || parsed.document_index > parsed.total_documents {
            return Err(FilenameError::DocumentIndexOutOfRange {
                index: parsed.document_index,
                total: parsed.total_documents,
            });
        }

        if !seen_indices.insert(parsed.document_index) {
            return Err(FilenameError::DuplicateDocumentIndex(parsed.document_index));
        }

        if parsed.nhs_number != nhs_number {
            return Err(FilenameError::NhsNumberMismatch);
        }

        if let Some(first) = parsed_set.first() {
            if first.person_name != parsed.person_name {
                return Err(FilenameError::PatientNameMismatch);
            }
        }

        parsed_set.push(parsed);
    }

    Ok(parsed_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileMetadata {
        FileMetadata {
            file_path: format!("/1234567890/{}", name),
            page_count: "1".to_string(),
            gp_practice_code: "Y12345".to_string(),
            nhs_number: "1234567890".to_string(),
            section: "LG".to_string(),
            sub_section: String::new(),
            scan_date: "03/09/2022".to_string(),
            scan_id: "NEC".to_string(),
            user_id: "NEC".to_string(),
            upload_date: "04/09/2022".to_string(),
            stored_file_name: format!("/1234567890/{}", name),
        }
    }

    fn lg(n: u32, m: u32, person: &str, nhs: &str) -> String {
        format!(
            "{}of{}_Lloyd_George_Record_[{}]_[{}]_[01-01-2000].pdf",
            n, m, person, nhs
        )
    }

    #[test]
    fn grammar_is_exact() {
        assert!(is_canonical(&lg(1, 2, "Jane Smith", "1234567890")));
        assert!(!is_canonical("1of2_Lloyd_George_Record_[Jane  Smith]_[1234567890]_[01-01-2000].pdf"));
        assert!(!is_canonical("1of2_Lloyd_George_Record_[Jane Smith]_[1234567890]_[1-1-2000].pdf"));
        assert!(!is_canonical("1of2_Lloyd_George_Record_[Jane Smith]_[1234567890]_[01-01-2000].PDF"));
        assert!(!is_canonical("1of2_lloyd_george_record_[Jane Smith]_[1234567890]_[01-01-2000].pdf"));
    }

    #[test]
    fn canonical_date_must_exist() {
        let err = parse_canonical("1of1_Lloyd_George_Record_[Jane Smith]_[1234567890]_[30-02-2000].pdf")
            .unwrap_err();
        assert_eq!(err, FilenameError::InvalidDate("30-02-2000".to_string()));
    }

    #[test]
    fn complete_set_passes() {
        let files = vec![
            file(&lg(1, 2, "Jane Smith", "1234567890")),
            file(&lg(2, 2, "Jane Smith", "1234567890")),
        ];
        let parsed = validate_file_set("1234567890", &files).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn declared_total_must_match_file_count() {
        let files = vec![
            file(&lg(1, 3, "Jane Smith", "1234567890")),
            file(&lg(2, 3, "Jane Smith", "1234567890")),
        ];
        assert_eq!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::FileCountMismatch {
                declared: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn duplicate_names_rejected() {
        let files = vec![
            file(&lg(1, 2, "Jane Smith", "1234567890")),
            file(&lg(1, 2, "Jane Smith", "1234567890")),
        ];
        assert!(matches!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::DuplicateFileName(_)
        ));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let files = vec![
            file(&lg(0, 2, "Jane Smith", "1234567890")),
            file(&lg(2, 2, "Jane Smith", "1234567890")),
        ];
        assert_eq!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::DocumentIndexOutOfRange { index: 0, total: 2 }
        );
    }

    #[test]
    fn cross_patient_contamination_rejected() {
        let files = vec![
            file(&lg(1, 2, "Jane Smith", "1234567890")),
            file(&lg(2, 2, "John Smith", "1234567890")),
        ];
        assert_eq!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::PatientNameMismatch
        );

        let files = vec![file(&lg(1, 1, "Jane Smith", "9876543210"))];
        assert_eq!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::NhsNumberMismatch
        );
    }

    #[test]
    fn non_canonical_member_rejected() {
        let files = vec![file("scan_001.pdf")];
        assert!(matches!(
            validate_file_set("1234567890", &files).unwrap_err(),
            FilenameError::NonCanonical(_)
        ));
    }
}
