//! Canonical identity keys for archive entries.
//!
//! Two links that differ only by query string, fragment, or the case of the
//! scheme and host collapse onto the same identity. Dropping the query is
//! deliberate: feeds append tracking parameters to the same article.

use url::{ParseError, Url};

/// Canonicalize a locator into the archive's identity key.
///
/// Returns an empty string for empty input. Never fails: if the locator
/// cannot be parsed as a URL, the query and fragment are cut off textually
/// and the rest is lower-cased.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize("https://A.ORG/x?utm_source=rss#top"), "https://a.org/x");
/// assert_eq!(normalize("a.org/x"), "https://a.org/x");
/// ```
pub fn normalize(locator: &str) -> String {
    let s = locator.trim();
    if s.is_empty() {
        return String::new();
    }

    match parse_with_default_scheme(s) {
        Some(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            // Special schemes already get a lower-cased host from the parser.
            if let Some(host) = url.host_str().map(str::to_string) {
                let lowered = host.to_lowercase();
                if lowered != host {
                    let _ = url.set_host(Some(&lowered));
                }
            }
            url.to_string()
        }
        None => strip_syntactically(s),
    }
}

fn parse_with_default_scheme(s: &str) -> Option<Url> {
    match Url::parse(s) {
        Ok(url) => Some(url),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let prefixed = if s.starts_with("//") {
                format!("https:{s}")
            } else {
                format!("https://{s}")
            };
            Url::parse(&prefixed).ok()
        }
        Err(_) => None,
    }
}

fn strip_syntactically(s: &str) -> String {
    let without_fragment = s.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    without_query.trim().to_lowercase()
}
