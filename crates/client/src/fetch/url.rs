//! URL resolution against the worker scope.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a possibly relative URL against the worker scope.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join with the scope (absolute inputs replace it, `./x` and `/x` resolve)
/// 3. Require http or https
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(scope: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = scope.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Url {
        Url::parse("https://app.example.com/edu/").unwrap()
    }

    #[test]
    fn test_resolve_dot_relative() {
        let url = resolve(&scope(), "./index.html").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/edu/index.html");
    }

    #[test]
    fn test_resolve_scope_root() {
        let url = resolve(&scope(), "./").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/edu/");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve(&scope(), "/offline.html").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/offline.html");
    }

    #[test]
    fn test_resolve_absolute_other_origin() {
        let url = resolve(&scope(), "https://www.gstatic.com/firebasejs/9.6.10/firebase-app-compat.js").unwrap();
        assert_eq!(url.host_str(), Some("www.gstatic.com"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve(&scope(), "https://CDN.EXAMPLE.COM/a.js").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_remove_fragment_preserve_query() {
        let url = resolve(&scope(), "guide.html?lang=bn#intro").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("lang=bn"));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&scope(), "file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&scope(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&scope(), "   "), Err(UrlError::Empty)));
    }
}
