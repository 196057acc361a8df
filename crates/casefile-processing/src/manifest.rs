//! Manifest CSV reader
//!
//! The manifest is read whole before anything else happens: a structural
//! problem anywhere in it (missing column, wrong field count) means the input
//! may be truncated or corrupt, so the caller gets an error and no rows.

use casefile_core::models::FileMetadata;
use csv::{ReaderBuilder, StringRecord, Trim};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const COLUMN_FILE_PATH: &str = "FILEPATH";
pub const COLUMN_PAGE_COUNT: &str = "PAGE COUNT";
pub const COLUMN_GP_PRACTICE_CODE: &str = "GP-PRACTICE-CODE";
pub const COLUMN_NHS_NUMBER: &str = "NHS-NO";
pub const COLUMN_SECTION: &str = "SECTION";
pub const COLUMN_SUB_SECTION: &str = "SUB-SECTION";
pub const COLUMN_SCAN_DATE: &str = "SCAN-DATE";
pub const COLUMN_SCAN_ID: &str = "SCAN-ID";
pub const COLUMN_USER_ID: &str = "USER-ID";
pub const COLUMN_UPLOAD_DATE: &str = "UPLOAD";

const REQUIRED_COLUMNS: [&str; 10] = [
    COLUMN_FILE_PATH,
    COLUMN_PAGE_COUNT,
    COLUMN_GP_PRACTICE_CODE,
    COLUMN_NHS_NUMBER,
    COLUMN_SECTION,
    COLUMN_SUB_SECTION,
    COLUMN_SCAN_DATE,
    COLUMN_SCAN_ID,
    COLUMN_USER_ID,
    COLUMN_UPLOAD_DATE,
];

/// Structural manifest errors. Any of these aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest is missing required column {0}")]
    MissingColumn(&'static str),

    #[error("Malformed manifest row at line {line}: {message}")]
    RowShape { line: u64, message: String },

    #[error("Unreadable manifest: {0}")]
    Unreadable(String),
}

impl From<ManifestError> for casefile_core::AppError {
    fn from(err: ManifestError) -> Self {
        casefile_core::AppError::MalformedManifest(err.to_string())
    }
}

/// One manifest row as written by the uploader, before filename resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// 1-based line in the manifest, header included.
    pub line: u64,
    pub file_path: String,
    pub page_count: String,
    pub gp_practice_code: String,
    pub nhs_number: String,
    pub section: String,
    pub sub_section: String,
    pub scan_date: String,
    pub scan_id: String,
    pub user_id: String,
    pub upload_date: String,
}

impl ManifestRow {
    /// Fixes the resolved name; the resulting metadata is not changed afterwards.
    pub fn into_file_metadata(self, stored_file_name: String) -> FileMetadata {
        FileMetadata {
            file_path: self.file_path,
            page_count: self.page_count,
            gp_practice_code: self.gp_practice_code,
            nhs_number: self.nhs_number,
            section: self.section,
            sub_section: self.sub_section,
            scan_date: self.scan_date,
            scan_id: self.scan_id,
            user_id: self.user_id,
            upload_date: self.upload_date,
            stored_file_name,
        }
    }
}

/// Positions of the required columns in the header row.
struct ColumnIndex([usize; 10]);

impl ColumnIndex {
    fn locate(headers: &StringRecord) -> Result<Self, ManifestError> {
        let mut positions = [0usize; 10];
        for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
                .ok_or(ManifestError::MissingColumn(column))?;
        }
        Ok(ColumnIndex(positions))
    }

    fn row(&self, line: u64, record: &StringRecord) -> ManifestRow {
        let field = |i: usize| record.get(self.0[i]).unwrap_or_default().to_string();
        ManifestRow {
            line,
            file_path: field(0),
            page_count: field(1),
            gp_practice_code: field(2),
            nhs_number: field(3),
            section: field(4),
            sub_section: field(5),
            scan_date: field(6),
            scan_id: field(7),
            user_id: field(8),
            upload_date: field(9),
        }
    }
}

/// Reads every row of a manifest.
///
/// A leading UTF-8 byte order mark is skipped and invalid UTF-8 sequences are
/// replaced rather than rejected. Columns are matched by header name, in any order.
pub fn read_manifest(bytes: &[u8]) -> Result<Vec<ManifestRow>, ManifestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ManifestError::Unreadable(e.to_string()))?
        .clone();
    let columns = ColumnIndex::locate(&headers)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ManifestError::RowShape {
            line: e.position().map(|p| p.line()).unwrap_or_default(),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        rows.push(columns.row(line, &record));
    }

    tracing::debug!(rows = rows.len(), "Manifest read");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "FILEPATH,PAGE COUNT,GP-PRACTICE-CODE,NHS-NO,SECTION,SUB-SECTION,SCAN-DATE,SCAN-ID,USER-ID,UPLOAD";

    fn row(path: &str, nhs: &str) -> String {
        format!("{},1,Y12345,{},LG,,03/09/2022,NEC,NEC,04/09/2022", path, nhs)
    }

    #[test]
    fn reads_rows_with_bom() {
        let csv = format!(
            "\u{feff}{}\n{}\n{}\n",
            HEADER,
            row("/1234567890/1of2.pdf", "1234567890"),
            row("/1234567890/2of2.pdf", "1234567890")
        );
        let rows = read_manifest(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].file_path, "/1234567890/1of2.pdf");
        assert_eq!(rows[0].nhs_number, "1234567890");
        assert_eq!(rows[0].gp_practice_code, "Y12345");
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn columns_may_be_reordered() {
        let csv = "NHS-NO,FILEPATH,PAGE COUNT,GP-PRACTICE-CODE,SECTION,SUB-SECTION,SCAN-DATE,SCAN-ID,USER-ID,UPLOAD\n\
                   1234567890,a.pdf,1,Y12345,LG,,d,s,u,up\n";
        let rows = read_manifest(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].file_path, "a.pdf");
        assert_eq!(rows[0].nhs_number, "1234567890");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut bytes = format!("{}\n", HEADER).into_bytes();
        bytes.extend_from_slice(b"/1234567890/J\xffne.pdf,1,Y12345,1234567890,LG,,d,s,u,up\n");
        let rows = read_manifest(&bytes).unwrap();
        assert_eq!(rows[0].file_path, "/1234567890/J\u{fffd}ne.pdf");
    }

    #[test]
    fn missing_column_aborts() {
        let csv = "FILEPATH,PAGE COUNT\na.pdf,1\n";
        let err = read_manifest(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::MissingColumn(COLUMN_GP_PRACTICE_CODE)));
    }

    #[test]
    fn short_row_aborts_the_batch() {
        let csv = format!(
            "{}\n{}\n/1234567890/2of2.pdf,1,Y12345\n",
            HEADER,
            row("/1234567890/1of2.pdf", "1234567890")
        );
        let err = read_manifest(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::RowShape { line: 3, .. }));
    }
}
