use log::debug;
use url::Url;

use crate::structs::overrides::PageviewOverrides;

/// Values a pageview record takes from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPage {
    pub path: String,
    pub hostname: String,
    pub referrer: String,
}

/// Prefer the page's canonical link over its actual location.
pub fn resolve_location(actual: Url, canonical_href: Option<&str>) -> Url {
    match canonical_href.filter(|href| !href.is_empty()) {
        Some(href) => match actual.join(href) {
            Ok(canonical) => canonical,
            Err(e) => {
                debug!("Ignoring unparsable canonical link {:?}: {}", href, e);
                actual
            }
        },
        None => actual,
    }
}

pub fn is_untrackable_host(location: &Url) -> bool {
    match location.host_str() {
        None | Some("") => true,
        Some(host) => host == "localhost" || host == "127.0.0.1",
    }
}

/// Pathname plus query string, `/` when both are empty.
pub fn page_path(location: &Url) -> String {
    let mut path = location.path().to_string();
    if let Some(query) = location.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

pub fn page_hostname(location: &Url) -> String {
    format!(
        "{}://{}",
        location.scheme(),
        location.host_str().unwrap_or_default()
    )
}

/// Drop the referrer when it mentions our own hostname. This is a plain
/// substring match, not an origin comparison: `https://example.com.evil.test`
/// counts as internal to `https://example.com`.
pub fn external_referrer(document_referrer: &str, hostname: &str) -> String {
    if document_referrer.contains(hostname) {
        String::new()
    } else {
        document_referrer.to_string()
    }
}

pub fn derive_page(
    location: &Url,
    overrides: &PageviewOverrides,
    document_referrer: &str,
) -> DerivedPage {
    let hostname = overrides
        .hostname()
        .map(str::to_string)
        .unwrap_or_else(|| page_hostname(location));
    let referrer = overrides
        .referrer()
        .map(str::to_string)
        .unwrap_or_else(|| external_referrer(document_referrer, &hostname));

    DerivedPage {
        path: page_path(location),
        hostname,
        referrer,
    }
}
