use crate::UrlError;
use url::Url;

/// Query parameters that only carry campaign tracking and never change page content
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref"];

/// Parses a URL and checks that it is something the fetcher can visit
///
/// Only absolute `http`/`https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use scout_crawler::url::parse_target_url;
///
/// assert!(parse_target_url("https://example.com/feed").is_ok());
/// assert!(parse_target_url("ftp://example.com/").is_err());
/// ```
pub fn parse_target_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Normalizes a discovered link so duplicates collapse to one article
///
/// # Normalization Steps
///
/// 1. Parse and validate the URL (see [`parse_target_url`])
/// 2. Lowercase the host
/// 3. Remove the fragment
/// 4. Remove tracking query parameters (`utm_*`, `fbclid`, ...)
/// 5. Remove a trailing slash from non-root paths
///
/// The scheme is preserved: unlike a polite mapper we fetch exactly what the
/// page links to.
///
/// # Examples
///
/// ```
/// use scout_crawler::url::normalize_url;
///
/// let url = normalize_url("https://Example.COM/posts/1/?utm_source=rss#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/posts/1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = parse_target_url(url_str)?;

    // Url::parse already lowercases registrable hosts; IP literals and
    // opaque hosts are left as written.
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
        }
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url)
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
