use url::Url;

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use page_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when both URLs point at the same site
///
/// Hosts are compared case-insensitively with a leading `www.` ignored, and the
/// ports must match. Pagination never leaves the site it started on.
pub fn same_site(a: &Url, b: &Url) -> bool {
    fn site(url: &Url) -> Option<(String, Option<u16>)> {
        let host = extract_domain(url)?;
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        Some((host, url.port_or_known_default()))
    }

    match (site(a), site(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
