//! Patient registration lookup
//!
//! The national patient directory (PDS) is an external collaborator. The
//! pipeline only needs one answer from it: which practice a patient is
//! currently registered with, or a sentinel when the record is suspended,
//! deceased or restricted.

use async_trait::async_trait;
use casefile_core::constants::{ODS_DECEASED, ODS_RESTRICTED, ODS_SUSPENDED};
use casefile_core::AppError;

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// ODS code of the patient's current practice, or one of `SUSP`, `DECE`, `REST`.
    async fn current_gp_ods(&self, nhs_number: &str, uploader_ods_code: &str)
        -> Result<String, AppError>;
}

/// Directory for deployments without PDS access: every patient is taken to be
/// registered with the practice that uploaded the records.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoPatientDirectory;

#[async_trait]
impl PatientDirectory for EchoPatientDirectory {
    async fn current_gp_ods(
        &self,
        _nhs_number: &str,
        uploader_ods_code: &str,
    ) -> Result<String, AppError> {
        Ok(uploader_ods_code.to_string())
    }
}

/// Whether a directory answer is a status sentinel rather than a practice code.
pub fn is_sentinel(ods_code: &str) -> bool {
    matches!(ods_code, ODS_SUSPENDED | ODS_DECEASED | ODS_RESTRICTED)
}
