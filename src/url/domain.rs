use url::Url;

/// Extracts the domain from a URL
///
/// The domain is the lowercase host. Ports are not part of it, so every
/// service on a host shares one circuit-breaker partition.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use scout_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the circuit-breaker partition key for a raw URL string
///
/// Strings that do not parse, or parse without a host, are keyed by their
/// trimmed, lowercased text so that repeated failures against the same
/// malformed target still accumulate.
pub fn domain_key(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| extract_domain(&u))
        .unwrap_or_else(|| url.trim().to_lowercase())
}
