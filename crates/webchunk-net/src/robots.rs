//! C4 (robots.txt slice): RFC 9309 longest-match semantics (spec §4.4).

use std::time::Duration;

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    allow: bool,
}

#[derive(Debug, Clone)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<Duration>,
}

/// Parsed `robots.txt`, exposing only the behaviors the crawler relies on.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
    sitemaps: Vec<String>,
}

impl RobotsTxt {
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut current: Option<Group> = None;
        let mut seen_rule_in_group = false;

        for raw_line in body.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();

            match key.as_str() {
                "user-agent" => {
                    if seen_rule_in_group || current.is_none() {
                        if let Some(g) = current.take() {
                            groups.push(g);
                        }
                        current = Some(Group {
                            agents: Vec::new(),
                            rules: Vec::new(),
                            crawl_delay: None,
                        });
                        seen_rule_in_group = false;
                    }
                    if let Some(g) = current.as_mut() {
                        g.agents.push(value.to_ascii_lowercase());
                    }
                }
                "disallow" => {
                    if let Some(g) = current.as_mut() {
                        if !value.is_empty() {
                            g.rules.push(Rule { pattern: value, allow: false });
                        }
                        seen_rule_in_group = true;
                    }
                }
                "allow" => {
                    if let Some(g) = current.as_mut() {
                        g.rules.push(Rule { pattern: value, allow: true });
                        seen_rule_in_group = true;
                    }
                }
                "crawl-delay" => {
                    if let Some(g) = current.as_mut() {
                        if let Ok(secs) = value.parse::<f64>() {
                            g.crawl_delay = Some(Duration::from_secs_f64(secs));
                        }
                        seen_rule_in_group = true;
                    }
                }
                "sitemap" => sitemaps.push(value),
                _ => {}
            }
        }
        if let Some(g) = current.take() {
            groups.push(g);
        }

        Self { groups, sitemaps }
    }

    fn matching_group(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_ascii_lowercase();
        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }

    /// `Allow` beats an equally-specific `Disallow`; longer patterns win
    /// regardless of directive type.
    pub fn is_url_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.matching_group(user_agent) else {
            return true;
        };

        let mut best: Option<&Rule> = None;
        for rule in &group.rules {
            if path_matches(path, &rule.pattern) {
                let better = match best {
                    None => true,
                    Some(b) => {
                        rule.pattern.len() > b.pattern.len()
                            || (rule.pattern.len() == b.pattern.len() && rule.allow && !b.allow)
                    }
                };
                if better {
                    best = Some(rule);
                }
            }
        }
        best.map(|r| r.allow).unwrap_or(true)
    }

    pub fn get_crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.matching_group(user_agent).and_then(|g| g.crawl_delay)
    }

    pub fn get_sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// robots.txt pattern matching: `*` matches any run of characters, `$`
/// anchors end-of-path, everything else is a literal prefix/substring
/// match per RFC 9309 §2.2.3.
fn path_matches(path: &str, pattern: &str) -> bool {
    let (pattern, anchored_end) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let segments: Vec<&str> = pattern.split('*').collect();
    let mut cursor = path;

    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        if i == 0 {
            if !cursor.starts_with(seg) {
                return false;
            }
            cursor = &cursor[seg.len()..];
        } else {
            match cursor.find(seg) {
                Some(pos) => cursor = &cursor[pos + seg.len()..],
                None => return false,
            }
        }
    }

    if anchored_end {
        let last = segments.last().copied().unwrap_or("");
        path.ends_with(last)
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "\
User-agent: *\n\
Disallow: /private\n\
Allow: /private/public\n\
Crawl-delay: 2\n\
Sitemap: https://example.com/sitemap.xml\n\
";

    #[test]
    fn disallow_blocks_matching_prefix() {
        let robots = RobotsTxt::parse(BODY);
        assert!(!robots.is_url_allowed("/private/secret", "anybot"));
    }

    #[test]
    fn longer_allow_wins_over_shorter_disallow() {
        let robots = RobotsTxt::parse(BODY);
        assert!(robots.is_url_allowed("/private/public/page", "anybot"));
    }

    #[test]
    fn unmatched_path_is_allowed_by_default() {
        let robots = RobotsTxt::parse(BODY);
        assert!(robots.is_url_allowed("/anything-else", "anybot"));
    }

    #[test]
    fn crawl_delay_and_sitemaps_are_parsed() {
        let robots = RobotsTxt::parse(BODY);
        assert_eq!(robots.get_crawl_delay("anybot"), Some(Duration::from_secs(2)));
        assert_eq!(robots.get_sitemaps(), &["https://example.com/sitemap.xml".to_string()]);
    }

    #[test]
    fn specific_agent_group_beats_wildcard() {
        let body = "User-agent: specialbot\nDisallow: /only-special\n\nUser-agent: *\nDisallow: /everyone\n";
        let robots = RobotsTxt::parse(body);
        // Groups are exclusive per RFC 9309: `specialbot` gets only its own
        // group's rules, not a merge with `*`, so a path the wildcard group
        // disallows is still default-allowed here.
        assert!(robots.is_url_allowed("/everyone", "specialbot/1.0"));
        assert!(!robots.is_url_allowed("/only-special", "specialbot/1.0"));
        assert!(robots.is_url_allowed("/only-special", "genericbot"));
    }
}
