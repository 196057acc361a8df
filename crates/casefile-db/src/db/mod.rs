//! Repository implementations
//
// Permanent document metadata
pub mod document_reference;
//
// Bulk upload audit log
pub mod upload_report;

pub use document_reference::{DocumentReferenceRepository, DocumentReferenceRepositoryTrait};
pub use upload_report::{ReportCursor, ReportPage, UploadReportRepository, UploadReportRepositoryTrait};

/// One page of a keyset-paginated scan.
#[derive(Debug, Clone)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    /// Cursor for the next page, `None` on the last page.
    pub next: Option<C>,
}
