use url::Url;

/// Extracts the host from a URL, lowercased and without the port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitetree::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.test:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.test".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the host from a URL string
///
/// Returns `None` when the string does not parse or has no host, which is the
/// case for an unset seed URL.
pub fn domain_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_domain)
}
