//! Document URL construction for the realtime-database REST API.

/// Error type for document URL construction failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Build the `.json` endpoint for a document path.
///
/// Normalization steps:
/// 1. Trim whitespace, default scheme to https:// if missing
/// 2. Lowercase the host, drop query and fragment
/// 3. Append the document path with surrounding slashes removed, plus `.json`
pub fn document_url(database_url: &str, document_path: &str) -> Result<url::Url, UrlError> {
    let trimmed = database_url.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_query(None);
    parsed.set_fragment(None);

    let base = parsed.path().trim_end_matches('/').to_string();
    let document = document_path.trim_matches('/');
    if document.is_empty() {
        return Err(UrlError::InvalidUrl("empty document path".into()));
    }
    parsed.set_path(&format!("{base}/{document}.json"));

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_url_basic() {
        let url = document_url("https://shelf-rtdb.example.com", "apps").unwrap();
        assert_eq!(url.as_str(), "https://shelf-rtdb.example.com/apps.json");
    }

    #[test]
    fn test_document_url_default_scheme_and_host_case() {
        let url = document_url("Shelf-RTDB.example.com/", "/apps/").unwrap();
        assert_eq!(url.as_str(), "https://shelf-rtdb.example.com/apps.json");
    }

    #[test]
    fn test_document_url_nested_path() {
        let url = document_url("http://localhost:9000/db/", "catalog/apps").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/db/catalog/apps.json");
    }

    #[test]
    fn test_document_url_drops_query_and_fragment() {
        let url = document_url("https://example.com/?ns=shelf#top", "apps").unwrap();
        assert_eq!(url.as_str(), "https://example.com/apps.json");
    }

    #[test]
    fn test_document_url_errors() {
        assert!(matches!(document_url("  ", "apps"), Err(UrlError::Empty)));
        assert!(matches!(document_url("ftp://example.com", "apps"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(document_url("https://example.com", "/"), Err(UrlError::InvalidUrl(_))));
    }
}
