//! Validation helpers applied before configuration mutations are persisted.

use pt_data::DownloaderType;
use pt_filter::PatternKind;

use crate::error::{ConfigError, Result};

/// §3 invariant: `validate(patternType, pattern)` must succeed before a
/// filter rule is persisted.
pub fn validate_filter_rule(pattern_kind: PatternKind, pattern: &str) -> Result<()> {
    pt_filter::validate(pattern_kind, pattern)?;
    Ok(())
}

/// Parse and validate a downloader type string before registering a new
/// downloader backend.
pub fn validate_downloader_type(value: &str) -> Result<DownloaderType> {
    DownloaderType::parse(value).map_err(|source| match source {
        pt_data::DataError::RowDecode { reason, .. } => ConfigError::UnknownDownloaderType {
            value: format!("{value} ({reason})"),
        },
        other => ConfigError::from(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(validate_filter_rule(PatternKind::Keyword, "").is_err());
    }

    #[test]
    fn valid_keyword_pattern_is_accepted() {
        assert!(validate_filter_rule(PatternKind::Keyword, "1080p").is_ok());
    }

    #[test]
    fn unknown_downloader_type_is_rejected() {
        assert!(validate_downloader_type("deluge").is_err());
    }

    #[test]
    fn known_downloader_types_are_accepted() {
        assert!(validate_downloader_type("qbittorrent").is_ok());
        assert!(validate_downloader_type("transmission").is_ok());
    }
}
