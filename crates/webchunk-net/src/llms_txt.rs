//! C4 (advisory adapters): llms.txt, ai.txt, and web-app manifest parsing.
//! These are peripheral discovery helpers (spec §1, §4.4); their fields may
//! tune crawl/chunk options but must never change pipeline contracts.

use std::collections::HashMap;

/// Parsed `llms.txt` per the llmstxt.org convention: an H1 title, an
/// optional blockquote summary, and `## Section` link lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmsTxt {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub sections: HashMap<String, Vec<LlmsLink>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmsLink {
    pub text: String,
    pub url: String,
    pub note: Option<String>,
}

pub fn parse_llms_txt(body: &str) -> LlmsTxt {
    let mut doc = LlmsTxt::default();
    let mut current_section: Option<String> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(title) = line.strip_prefix("# ") {
            doc.title = Some(title.trim().to_string());
        } else if let Some(section) = line.strip_prefix("## ") {
            current_section = Some(section.trim().to_string());
            doc.sections.entry(section.trim().to_string()).or_default();
        } else if let Some(quote) = line.strip_prefix("> ") {
            if doc.summary.is_none() {
                doc.summary = Some(quote.trim().to_string());
            }
        } else if let Some(item) = line.strip_prefix("- ") {
            if let Some(link) = parse_markdown_link(item) {
                if let Some(section) = &current_section {
                    doc.sections.entry(section.clone()).or_default().push(link);
                }
            }
        }
    }

    doc
}

fn parse_markdown_link(item: &str) -> Option<LlmsLink> {
    let open = item.find('[')?;
    let close = item[open..].find(']')? + open;
    let text = item[open + 1..close].to_string();

    let rest = &item[close + 1..];
    let paren_open = rest.find('(')?;
    let paren_close = rest[paren_open..].find(')')? + paren_open;
    let url = rest[paren_open + 1..paren_close].to_string();

    let note = rest[paren_close + 1..]
        .trim()
        .trim_start_matches(':')
        .trim()
        .to_string();
    let note = if note.is_empty() { None } else { Some(note) };

    Some(LlmsLink { text, url, note })
}

/// Simple `key: value` advisory document (`ai.txt`, non-W3C manifests).
pub fn parse_key_value_txt(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split_once(':').map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

/// Minimal web app manifest fields relevant to crawl tuning (`name`,
/// `start_url`, `scope`); full PWA manifest parsing is out of scope.
pub fn parse_manifest_json(body: &str) -> HashMap<String, String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return HashMap::new();
    };
    let mut out = HashMap::new();
    if let Some(obj) = value.as_object() {
        for key in ["name", "short_name", "start_url", "scope"] {
            if let Some(v) = obj.get(key).and_then(|v| v.as_str()) {
                out.insert(key.to_string(), v.to_string());
            }
        }
    }
    out
}
