use thiserror::Error;
use url::Url;

/// Errors that can occur when registering a source URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates that `url_str` is an absolute http(s) URL with a host.
///
/// Checked once when a source is registered; the fetcher trusts stored URLs.
///
/// # Examples
///
/// ```
/// use gator::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("example.com/feed.xml").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_url("http://example.com/rss").is_ok());
        assert!(validate_url("https://example.com/index.xml").is_ok());
    }

    #[test]
    fn test_trims_whitespace() {
        let url = validate_url("  https://example.com/rss \n").unwrap();
        assert_eq!(url.as_str(), "https://example.com/rss");
    }

    #[test]
    fn test_rejects_relative() {
        assert!(matches!(
            validate_url("/feed.xml"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com/feed.xml"),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }
}
