use serde::{Deserialize, Serialize};

/// One manifest row after filename resolution.
///
/// `file_path` is the key of the staged object exactly as the manifest names it;
/// `stored_file_name` is the resolved (possibly normalized) path used for the
/// permanent copy. Neither changes once the row has been grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
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
    pub stored_file_name: String,
}

impl FileMetadata {
    /// Last path segment of the resolved name.
    pub fn stored_base_name(&self) -> &str {
        base_name(&self.stored_file_name)
    }

    /// Staging object key; manifest paths may carry a leading slash.
    pub fn staging_key(&self) -> &str {
        self.file_path.trim_start_matches('/')
    }
}

/// Returns the last `/`-separated segment of a path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// All files of one patient from one manifest, in manifest order.
///
/// This is the body of every dispatched queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingMetadata {
    pub nhs_number: String,
    pub files: Vec<FileMetadata>,
}

impl StagingMetadata {
    pub fn new(nhs_number: impl Into<String>, files: Vec<FileMetadata>) -> Self {
        Self {
            nhs_number: nhs_number.into(),
            files,
        }
    }

    /// ODS code of the uploading practice. Groups are keyed by it, so every file agrees.
    pub fn uploader_ods_code(&self) -> &str {
        self.files
            .first()
            .map(|f| f.gp_practice_code.as_str())
            .unwrap_or_default()
    }

    /// Manifest paths of every file, joined for audit rows.
    pub fn joined_file_paths(&self) -> String {
        join_file_paths(&self.files)
    }
}

pub fn join_file_paths(files: &[FileMetadata]) -> String {
    files
        .iter()
        .map(|f| f.file_path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
