//! Casefile Services Layer
//!
//! This crate is the orchestration layer of the bulk upload pipeline. It ties
//! the parsing crate, the object store, the metadata repositories and the queue
//! together:
//!
//! - [`IngestService`] reads a manifest, groups it per patient, records rejected
//!   patients and fans the rest out through the [`Dispatcher`].
//! - [`BulkUploadHandler`] consumes one patient per message: set validation,
//!   practice lookup, the virus scan admission gate and the transactional move.
//! - [`ReportService`] turns the audit log into per-practice and summary CSVs.

pub mod dispatcher;
pub mod handler;
pub mod ingest;
pub mod patient_directory;
pub mod report;
pub mod transaction;
pub mod virus_scan;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use dispatcher::{DispatchError, DispatchReceipt, Dispatcher};
pub use handler::BulkUploadHandler;
pub use ingest::{IngestService, IngestSummary};
pub use patient_directory::{EchoPatientDirectory, PatientDirectory};
pub use report::{OdsReport, ReportError, ReportOutcome, ReportService, SummaryReport};
pub use transaction::{TransactionContext, TransactionError, TransactionalMover};
pub use virus_scan::{GateError, VirusScanGate, VirusScanRejection};

pub use casefile_storage::{create_storage, Storage, StorageError, StorageResult};
