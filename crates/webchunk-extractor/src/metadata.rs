//! C7: HTML Metadata Snapshot (spec §4.7). Synchronous structural
//! extraction — title, `<meta>` tags, OpenGraph, Twitter Card, JSON-LD.

use std::collections::HashMap;

use chrono::Utc;
use scraper::{Html, Selector};

use webchunk_common::types::{HtmlMetadataSnapshot, OpenGraphMetadata, TwitterCardMetadata};

pub fn extract_metadata_snapshot(body: &str) -> HtmlMetadataSnapshot {
    let document = Html::parse_document(body);
    let meta_selector = Selector::parse("meta").unwrap();

    let mut meta_tags = HashMap::new();
    for meta in document.select(&meta_selector) {
        let key = meta.value().attr("name").or_else(|| meta.value().attr("property"));
        if let (Some(key), Some(content)) = (key, meta.value().attr("content")) {
            meta_tags.insert(key.to_string(), content.to_string());
        }
    }

    let open_graph = meta_tags.get("og:title").map(|title| OpenGraphMetadata {
        title: Some(title.clone()),
        description: meta_tags.get("og:description").cloned(),
        image: meta_tags.get("og:image").cloned(),
        url: meta_tags.get("og:url").cloned(),
        site_name: meta_tags.get("og:site_name").cloned(),
        og_type: meta_tags.get("og:type").cloned(),
    });

    let twitter_card = meta_tags.get("twitter:card").map(|card| TwitterCardMetadata {
        card: Some(card.clone()),
        title: meta_tags.get("twitter:title").cloned(),
        description: meta_tags.get("twitter:description").cloned(),
        image: meta_tags.get("twitter:image").cloned(),
    });

    let structured_data = extract_json_ld(&document);

    HtmlMetadataSnapshot {
        meta_tags,
        open_graph,
        twitter_card,
        structured_data,
        extracted_at: Utc::now(),
    }
}

/// JSON-LD blocks indexed by `@type`; duplicates overwrite silently.
fn extract_json_ld(document: &Html) -> HashMap<String, serde_json::Value> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return HashMap::new();
    };

    let mut out = HashMap::new();
    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        for entry in flatten_json_ld(value) {
            if let Some(type_name) = entry.get("@type").and_then(|v| v.as_str()) {
                out.insert(type_name.to_string(), entry);
            }
        }
    }
    out
}

fn flatten_json_ld(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_graph_requires_og_title() {
        let body = r#"<html><head><meta property="og:description" content="desc"></head></html>"#;
        let snapshot = extract_metadata_snapshot(body);
        assert!(snapshot.open_graph.is_none());
    }

    #[test]
    fn open_graph_present_when_title_found() {
        let body = r#"<html><head>
            <meta property="og:title" content="My Page">
            <meta property="og:description" content="desc">
        </head></html>"#;
        let snapshot = extract_metadata_snapshot(body);
        let og = snapshot.open_graph.unwrap();
        assert_eq!(og.title.as_deref(), Some("My Page"));
        assert_eq!(og.description.as_deref(), Some("desc"));
    }

    #[test]
    fn twitter_card_requires_card_type() {
        let body = r#"<html><head><meta name="twitter:card" content="summary"><meta name="twitter:title" content="T"></head></html>"#;
        let snapshot = extract_metadata_snapshot(body);
        let card = snapshot.twitter_card.unwrap();
        assert_eq!(card.card.as_deref(), Some("summary"));
        assert_eq!(card.title.as_deref(), Some("T"));
    }

    #[test]
    fn json_ld_indexed_by_type() {
        let body = r#"<html><head><script type="application/ld+json">
            {"@type": "Article", "headline": "Hello"}
        </script></head></html>"#;
        let snapshot = extract_metadata_snapshot(body);
        assert!(snapshot.structured_data.contains_key("Article"));
    }
}
