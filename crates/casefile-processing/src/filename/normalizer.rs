use super::parser::parse_filename;
use super::validator::is_canonical;
use super::FilenameError;

/// Rewrites the last segment of `file_path` into canonical form, keeping any
/// directory prefix. Names that are already canonical come back unchanged.
pub fn normalize_file_path(file_path: &str) -> Result<String, FilenameError> {
    let (directory, base) = match file_path.rsplit_once('/') {
        Some((directory, base)) => (Some(directory), base),
        None => (None, file_path),
    };

    if is_canonical(base) {
        return Ok(file_path.to_string());
    }

    let (stem, extension) = base
        .rsplit_once('.')
        .ok_or_else(|| FilenameError::InvalidExtension(base.to_string()))?;
    if !extension.eq_ignore_ascii_case("pdf") {
        return Err(FilenameError::InvalidExtension(extension.to_string()));
    }

    let canonical = format!("{}.pdf", parse_filename(stem)?.canonical_stem());

    Ok(match directory {
        Some(directory) => format!("{}/{}", directory, canonical),
        None => canonical,
    })
}

/// Best-effort normalization: any parse failure yields the original path so the
/// validator downstream reports the real problem.
pub fn normalize_or_original(file_path: &str) -> String {
    normalize_file_path(file_path).unwrap_or_else(|error| {
        tracing::debug!(error = %error, "Filename could not be normalized, keeping original");
        file_path.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::parse_canonical;

    const CANONICAL: &str = "1of2_Lloyd_George_Record_[Jane Smith]_[1234567890]_[01-01-2000].pdf";

    #[test]
    fn canonical_names_are_unchanged() {
        assert_eq!(normalize_file_path(CANONICAL).unwrap(), CANONICAL);
        let nested = format!("/1234567890/{}", CANONICAL);
        assert_eq!(normalize_file_path(&nested).unwrap(), nested);
    }

    #[test]
    fn canonical_names_with_unusual_capitalisation_are_unchanged() {
        let name = "2of2_Lloyd_George_Record_[Jane McDonald]_[1234567890]_[01-01-2000].pdf";
        assert_eq!(normalize_or_original(name), name);
    }

    #[test]
    fn malformed_variants_recover_canonical_fields() {
        let expected = parse_canonical(CANONICAL).unwrap();
        for variant in [
            "1 of 2 Lloyd George Record [jane smith] [123 456 7890] [1-1-2000].PDF",
            "1OF2_LL0YD_GE0RGE_REC0RD_[JANE_SMITH]_[1234567890]_[01.01.2000].pdf",
            "1of2-lloyd-george-record-jane-smith-1234567890_01-01-00.pdf",
            "1_of_2_Lloyd_George_Record_Jane__Smith_1234567890_01_01_2000.pdf",
            "1of2 Lloyd George Record Jane Smith 1234567890 01 01 2000.pdf",
        ] {
            let normalized = normalize_file_path(variant).unwrap();
            assert_eq!(normalized, CANONICAL, "variant {variant}");
            assert_eq!(parse_canonical(&normalized).unwrap(), expected);
        }
    }

    #[test]
    fn directory_prefix_is_kept() {
        let normalized =
            normalize_file_path("9876543210/1of1 lloyd george record [a b] [9876543210] [2-3-2021].pdf")
                .unwrap();
        assert_eq!(
            normalized,
            "9876543210/1of1_Lloyd_George_Record_[A B]_[9876543210]_[02-03-2021].pdf"
        );
    }

    #[test]
    fn unrecoverable_names_fall_back_to_the_original() {
        let original = "1of2_Lloyd_George_Record_[Jane Smith]_[12345]_[01-01-2000].pdf";
        assert!(normalize_file_path(original).is_err());
        assert_eq!(normalize_or_original(original), original);

        let not_pdf = "1of2_Lloyd_George_Record_[Jane Smith]_[1234567890]_[01-01-2000].docx";
        assert_eq!(
            normalize_file_path(not_pdf).unwrap_err(),
            FilenameError::InvalidExtension("docx".to_string())
        );
        assert_eq!(normalize_or_original(not_pdf), not_pdf);
    }
}
