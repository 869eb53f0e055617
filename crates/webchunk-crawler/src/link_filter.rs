//! Domain allow-listing and glob include/exclude filtering for discovered
//! links (spec §4.5 step e).

/// `true` if `allowed` is empty (no restriction), or `host` equals one of
/// its entries, or is a subdomain of one.
pub fn domain_allowed(host: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|d| {
        let d = d.to_ascii_lowercase();
        host == d || host.ends_with(&format!(".{d}"))
    })
}

/// Glob match supporting `*` (any run of characters); everything else is
/// literal. Same technique as the robots.txt pattern matcher, generalized
/// to match anywhere in `text` rather than anchoring at the start.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return text == pattern;
    }

    let mut cursor = text;
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        if i == 0 {
            if !cursor.starts_with(seg) {
                return false;
            }
            cursor = &cursor[seg.len()..];
        } else if i == segments.len() - 1 {
            return cursor.ends_with(seg);
        } else {
            match cursor.find(seg) {
                Some(pos) => cursor = &cursor[pos + seg.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Exclude wins over include. An empty include list admits everything not
/// excluded.
pub fn passes_patterns(url: &str, include: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|p| glob_match(p, url)) {
        return false;
    }
    include.is_empty() || include.iter().any(|p| glob_match(p, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_allowed_matches_exact_and_subdomain() {
        let allowed = vec!["example.com".to_string()];
        assert!(domain_allowed("example.com", &allowed));
        assert!(domain_allowed("blog.example.com", &allowed));
        assert!(!domain_allowed("example.org", &allowed));
    }

    #[test]
    fn empty_allowed_domains_admits_everything() {
        assert!(domain_allowed("anything.test", &[]));
    }

    #[test]
    fn glob_match_handles_prefix_suffix_and_middle_wildcards() {
        assert!(glob_match("https://example.com/blog/*", "https://example.com/blog/post-1"));
        assert!(!glob_match("https://example.com/blog/*", "https://example.com/docs/post-1"));
        assert!(glob_match("*.pdf", "https://example.com/file.pdf"));
        assert!(glob_match("*/admin/*", "https://example.com/admin/users"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let include = vec!["*/blog/*".to_string()];
        let exclude = vec!["*/blog/draft-*".to_string()];
        assert!(passes_patterns("https://example.com/blog/post-1", &include, &exclude));
        assert!(!passes_patterns("https://example.com/blog/draft-1", &include, &exclude));
        assert!(!passes_patterns("https://example.com/docs/page", &include, &exclude));
    }
}
