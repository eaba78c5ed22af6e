use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a seed URL, accepting only HTTP(S) URLs with a host
pub fn parse_seed(url_str: &str) -> UrlResult<Url> {
    let url_str = url_str.trim();
    if url_str.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    check_scheme(&url)?;
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }
    Ok(url)
}

/// Resolves an attribute value found on a page into an absolute URL
///
/// The fragment is dropped, so `page#a` and `page#b` name the same resource.
/// Empty and fragment-only references resolve to nothing, and anything that is
/// not HTTP(S) after resolution (`mailto:`, `javascript:`, `data:`) is rejected.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitetree::url::resolve_reference;
///
/// let base = Url::parse("https://example.test/docs/index.html").unwrap();
/// let url = resolve_reference(&base, "../a.html#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.test/a.html");
/// ```
pub fn resolve_reference(base: &Url, value: &str) -> UrlResult<Url> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return Err(UrlError::Empty);
    }

    let mut url = base
        .join(value)
        .map_err(|e| UrlError::Parse(format!("{}: {}", value, e)))?;
    check_scheme(&url)?;
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

fn check_scheme(url: &Url) -> UrlResult<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UrlError::InvalidScheme(other.to_string())),
    }
}
