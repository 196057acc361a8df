//! Casefile Processing Library
//!
//! Pure, synchronous processing of bulk upload input:
//!
//! - `filename`: recovery of canonical Lloyd George filenames from imperfect
//!   names, and validation of a patient's file set
//! - `manifest`: reading the CSV manifest into raw rows
//! - `grouping`: folding rows into per-patient groups keyed by NHS number and
//!   uploader ODS code
//!
//! Nothing here touches storage, the database or the queue.

pub mod filename;
pub mod grouping;
pub mod manifest;

pub use filename::{
    normalize_file_path, normalize_or_original, resolve_file_path, validate_file_name,
    validate_file_set, FilenameError, ParsedFilename,
};
pub use grouping::{group_manifest_rows, FailedPatient, PatientGroups};
pub use manifest::{read_manifest, ManifestError, ManifestRow};
