//! Data models for the pipeline
//!
//! Organised by stage: staging metadata produced by manifest ingest, document
//! references written to the permanent metadata store, audit rows for reporting,
//! and the antivirus verdict attached to staged objects.

mod document_reference;
mod file_metadata;
mod report;
mod virus_scan;

pub use document_reference::*;
pub use file_metadata::*;
pub use report::*;
pub use virus_scan::*;
