use std::path::Path;

use prep_common::error::{PrepError, Result};
use url::Url;

/// Validates a URL, ensuring it uses the HTTPS scheme.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| PrepError::Validation(format!("Failed to parse URL '{url_str}': {e}")))?;
    if url.scheme() == "https" {
        Ok(url)
    } else {
        Err(PrepError::Validation(format!(
            "Invalid URL scheme for '{}': Must be https, but got '{}'",
            url_str,
            url.scheme()
        )))
    }
}

/// Sniffs the file's magic bytes. Returns the detected extension, or `None`
/// when the type is unknown (e.g. an HTML error page saved to disk).
pub fn sniff_extension(path: &Path) -> Result<Option<&'static str>> {
    Ok(infer::get_from_path(path)?.map(|kind| kind.extension()))
}

/// Logs a warning when the file on disk does not look like `expected_ext`.
/// The archive reader gives the authoritative verdict later.
pub fn warn_on_content_mismatch(path: &Path, expected_ext: &str) {
    match sniff_extension(path) {
        Ok(Some(actual)) if actual.eq_ignore_ascii_case(expected_ext) => {
            tracing::debug!(
                "Content type verified: {} matches expected {}",
                actual,
                expected_ext
            );
        }
        Ok(Some(actual)) => tracing::warn!(
            "{} looks like '{}', expected '{}'",
            path.display(),
            actual,
            expected_ext
        ),
        Ok(None) => tracing::warn!(
            "Could not determine content type for {}",
            path.display()
        ),
        Err(e) => tracing::debug!("Content sniffing failed for {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_pass() {
        let url = validate_url("https://drive.google.com/uc?id=abc").unwrap();
        assert_eq!(url.host_str(), Some("drive.google.com"));
    }

    #[test]
    fn plain_http_is_rejected() {
        let err = validate_url("http://drive.google.com/uc?id=abc").unwrap_err();
        assert!(matches!(err, PrepError::Validation(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn sniffs_zip_magic() {
        let dir = tempfile::tempdir().unwrap();
        let zip_like = dir.path().join("a.zip");
        std::fs::write(&zip_like, b"PK\x03\x04\x14\x00\x00\x00\x08\x00rest-of-header").unwrap();
        assert_eq!(sniff_extension(&zip_like).unwrap(), Some("zip"));

        let html = dir.path().join("b.zip");
        std::fs::write(&html, b"<!DOCTYPE html><html></html>").unwrap();
        assert_ne!(sniff_extension(&html).unwrap(), Some("zip"));
    }
}
