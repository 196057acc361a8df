//! Database repositories for the pipeline's metadata store
//!
//! Two tables back the pipeline: `document_references` (one row per document
//! moved into permanent storage) and `bulk_upload_reports` (the append-only
//! audit log the report job reads). Each has a repository trait so services can
//! be exercised against in-memory doubles.

pub mod db;
pub mod setup;

pub use db::*;
pub use setup::setup_database;
