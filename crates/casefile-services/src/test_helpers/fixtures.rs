//! Fixtures shared by unit and integration tests

use casefile_core::models::FileMetadata;

pub const MANIFEST_HEADER: &str =
    "FILEPATH,PAGE COUNT,GP-PRACTICE-CODE,NHS-NO,SECTION,SUB-SECTION,SCAN-DATE,SCAN-ID,USER-ID,UPLOAD";

/// Canonical staged path `/<nhs>/<n>of<m>_Lloyd_George_Record_[<name>]_[<nhs>]_[01-01-2000].pdf`.
pub fn lloyd_george_path(n: u32, m: u32, person_name: &str, nhs_number: &str) -> String {
    format!(
        "/{}/{}of{}_Lloyd_George_Record_[{}]_[{}]_[01-01-2000].pdf",
        nhs_number, n, m, person_name, nhs_number
    )
}

/// Metadata for an already-resolved file.
pub fn file_metadata(path: &str, nhs_number: &str, ods_code: &str) -> FileMetadata {
    FileMetadata {
        file_path: path.to_string(),
        page_count: "1".to_string(),
        gp_practice_code: ods_code.to_string(),
        nhs_number: nhs_number.to_string(),
        section: "LG".to_string(),
        sub_section: String::new(),
        scan_date: "03/09/2022".to_string(),
        scan_id: "NEC".to_string(),
        user_id: "NEC".to_string(),
        upload_date: "04/09/2022".to_string(),
        stored_file_name: path.to_string(),
    }
}

/// One manifest line for `path`.
pub fn manifest_row(path: &str, nhs_number: &str, ods_code: &str) -> String {
    format!(
        "{},1,{},{},LG,,03/09/2022,NEC,NEC,04/09/2022",
        path, ods_code, nhs_number
    )
}

/// A whole manifest with header.
pub fn manifest_csv(rows: &[String]) -> String {
    let mut csv = String::from(MANIFEST_HEADER);
    csv.push('\n');
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    csv
}
