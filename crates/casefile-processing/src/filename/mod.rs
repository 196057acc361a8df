//! Lloyd George filename handling
//!
//! Canonical form: `<n>of<m>_Lloyd_George_Record_[<Full Name>]_[<NHS number>]_[<dd-mm-yyyy>].pdf`.
//!
//! `parser` holds the individual extraction stages, `normalizer` composes them
//! into a best-effort rewrite of a malformed name, and `validator` enforces the
//! grammar on single names and on a patient's whole set.

mod normalizer;
mod parser;
mod validator;

use chrono::NaiveDate;

pub use normalizer::{normalize_file_path, normalize_or_original};
pub use parser::{
    extract_date, extract_document_number, extract_lloyd_george_marker, extract_nhs_number,
    extract_person_name, parse_filename,
};
pub use validator::{is_canonical, parse_canonical, validate_file_name, validate_file_set};

/// Resolves one manifest path: best-effort normalization, then validation of
/// the result. Returns the path to store the file under.
pub fn resolve_file_path(file_path: &str) -> Result<String, FilenameError> {
    let resolved = normalize_or_original(file_path);
    validate_file_name(&resolved)?;
    Ok(resolved)
}

/// Fields recovered from one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub document_index: u32,
    pub total_documents: u32,
    pub person_name: String,
    pub nhs_number: String,
    pub date: NaiveDate,
}

impl ParsedFilename {
    /// Canonical name without extension.
    pub fn canonical_stem(&self) -> String {
        format!(
            "{}of{}_{}_[{}]_[{}]_[{}]",
            self.document_index,
            self.total_documents,
            casefile_core::constants::LLOYD_GEORGE_MARKER,
            self.person_name,
            self.nhs_number,
            self.date.format("%d-%m-%Y")
        )
    }
}

/// Filename parse and validation failures.
///
/// The display text is what ends up in the failure reason of the audit row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("Document number not found in file name")]
    MissingDocumentNumber,

    #[error("Lloyd George record marker not found in file name")]
    MissingMarker,

    #[error("Patient name not found in file name")]
    MissingPersonName,

    #[error("NHS number not found in file name")]
    MissingNhsNumber,

    #[error("Invalid NHS number in file name: {0}")]
    InvalidNhsNumber(String),

    #[error("Date not found in file name")]
    MissingDate,

    #[error("Invalid date in file name: {0}")]
    InvalidDate(String),

    #[error("Incorrect file extension: {0}")]
    InvalidExtension(String),

    #[error("Incorrect file name format: {0}")]
    NonCanonical(String),

    #[error("Incorrect file type: {0}")]
    InvalidMimeType(String),

    #[error("Duplicate file name: {0}")]
    DuplicateFileName(String),

    #[error("Incorrect number of files: expected {declared}, received {actual}")]
    FileCountMismatch { declared: u32, actual: usize },

    #[error("Document number {index} out of range for {total} documents")]
    DocumentIndexOutOfRange { index: u32, total: u32 },

    #[error("Duplicate document number {0}")]
    DuplicateDocumentIndex(u32),

    #[error("Patient name does not match across files")]
    PatientNameMismatch,

    #[error("NHS number in file name does not match the patient")]
    NhsNumberMismatch,
}
