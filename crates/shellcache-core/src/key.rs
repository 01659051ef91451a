//! Logical resource keys.
//!
//! Cache entries are stored under full request URLs while the resource table
//! is keyed by origin-relative paths. Reconciliation, offline download and
//! fetch interception all map URLs back to table keys through this module so
//! the three call sites cannot drift apart.

use url::Url;

use crate::error::Result;

/// Key of the root document in the resource table.
pub const ROOT_KEY: &str = "/";

/// Cache-busting query marker dropped from request keys.
const VERSION_QUERY: &str = "?v=";

/// Map a stored request URL to its resource table key.
///
/// The origin and the slash after it are stripped; an empty remainder is the
/// root document. URLs from another origin are returned unchanged, which never
/// matches a table key.
pub fn logical_key(origin: &str, url: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let key = match url.strip_prefix(origin) {
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
        None => url,
    };
    if key.is_empty() {
        ROOT_KEY.to_string()
    } else {
        key.to_string()
    }
}

/// Map an intercepted request URL to its resource table key.
///
/// Builds on [`logical_key`] and additionally drops a `?v=` cache-busting
/// suffix and maps the bare origin and `origin/#...` routes to the root.
///
/// The hash-route rule only covers fragments directly under the origin;
/// nested paths with fragments are left alone.
pub fn request_key(origin: &str, url: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let mut key = logical_key(origin, url);
    if let Some((head, _)) = key.split_once(VERSION_QUERY) {
        key = head.to_string();
    }
    if key.is_empty() || url == origin || url.starts_with(&format!("{origin}/#")) {
        return ROOT_KEY.to_string();
    }
    key
}

/// URL a request is cached under: the request URL without its fragment.
///
/// Fragments never reach the server, so `/#/settings` and `/` share one entry.
pub fn cache_url(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

/// Resolve a resource table key to an absolute request URL under `scope`.
pub fn resource_url(scope: &Url, key: &str) -> Result<Url> {
    Ok(scope.join(key)?)
}
