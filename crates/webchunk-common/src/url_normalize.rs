//! C1: URL normalization and the visited-set used to enforce at-most-once
//! fetch per job (spec §4.1).

use std::collections::HashSet;
use std::sync::Mutex;

use url::Url;

use crate::error::{CommonError, Result};

/// Canonicalize a URL per spec §3: lowercase scheme & host, strip a leading
/// `www.`, drop the default port for the scheme, remove a trailing `/`
/// (except on the root path), collapse consecutive slashes, drop the
/// fragment, and keep the query string verbatim.
pub fn normalize(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw).map_err(|e| CommonError::InvalidUrl(raw.to_string(), e.to_string()))?;

    url.set_fragment(None);

    let scheme = url.scheme().to_ascii_lowercase();
    url.set_scheme(&scheme).ok();

    if let Some(host) = url.host_str() {
        let mut host = host.to_ascii_lowercase();
        if let Some(stripped) = host.strip_prefix("www.") {
            host = stripped.to_string();
        }
        url.set_host(Some(&host))
            .map_err(|e| CommonError::InvalidUrl(raw.to_string(), e.to_string()))?;
    }

    let is_default_port = match (url.scheme(), url.port()) {
        ("http", Some(80)) => true,
        ("https", Some(443)) => true,
        _ => false,
    };
    if is_default_port {
        url.set_port(None).ok();
    }

    let collapsed = collapse_slashes(url.path());
    let trimmed = if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.trim_end_matches('/').to_string()
    } else {
        collapsed
    };
    url.set_path(&trimmed);

    Ok(url.to_string())
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Resolve `href` against `base`, returning `None` for hrefs that aren't
/// crawlable links (`javascript:`, `data:`, empty fragments-only, ...).
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let href_trim = href.trim();
    if href_trim.is_empty() {
        return None;
    }
    let lower = href_trim.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") {
        return None;
    }
    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href_trim).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    Some(resolved.to_string())
}

/// Concurrent set of normalized URLs already seen in a job.
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `true` if `normalized` was newly inserted.
    pub fn add(&self, normalized: &str) -> bool {
        self.inner.lock().unwrap().insert(normalized.to_string())
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.inner.lock().unwrap().contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_www_default_port_fragment_and_trailing_slash() {
        let n = normalize("HTTPS://WWW.Example.com:443/a//b/?q=1#frag").unwrap();
        assert_eq!(n, "https://example.com/a/b/?q=1");
    }

    #[test]
    fn normalize_keeps_root_slash() {
        let n = normalize("https://example.com/").unwrap();
        assert_eq!(n, "https://example.com/");
    }

    #[test]
    fn normalize_is_idempotent() {
        let urls = [
            "https://WWW.example.com:443/foo/bar/",
            "http://example.com:80/x//y",
            "https://example.com/already/normal",
        ];
        for u in urls {
            let once = normalize(u).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn visited_set_add_is_exactly_once() {
        let set = VisitedSet::new();
        assert!(set.add("https://example.com/"));
        assert!(!set.add("https://example.com/"));
    }

    #[test]
    fn resolve_handles_relative_and_rejects_javascript() {
        assert_eq!(
            resolve("https://example.com/a/b", "../c").unwrap(),
            "https://example.com/a/c"
        );
        assert!(resolve("https://example.com/a/b", "javascript:void(0)").is_none());
    }
}
