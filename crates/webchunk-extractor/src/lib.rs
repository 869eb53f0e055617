//! C6/C7: Content Extractor and HTML Metadata Snapshot (spec §4.6/§4.7).
//! Dispatches by content type, builds `ExtractedContent`, and separately
//! offers the synchronous `HtmlMetadataSnapshot` extractor.

pub mod html;
pub mod markdown;
pub mod metadata;
pub mod other;
pub mod quality;
pub mod raw;
pub mod sniff;

use std::time::Instant;

use chrono::Utc;
use tracing::instrument;

use webchunk_common::types::{ContentType, ExtractedContent, WebContentMetadata};

pub use metadata::extract_metadata_snapshot;
pub use sniff::sniff;

#[instrument(skip(body), fields(source_url = %source_url))]
pub fn extract(body: &str, source_url: &str, declared_content_type: Option<&str>) -> ExtractedContent {
    let started = Instant::now();
    let content_type = sniff(body, declared_content_type);

    let raw = match content_type {
        ContentType::Html => html::extract_html(body, source_url),
        ContentType::Markdown => markdown::extract_markdown(body, source_url),
        ContentType::Json => other::extract_json(body),
        ContentType::Xml => other::extract_xml(body),
        ContentType::PlainText | ContentType::Unknown => other::extract_plain_text(body),
    };

    let mut warnings = Vec::new();
    if raw.main_text.trim().is_empty() {
        warnings.push("no text content extracted".to_string());
    }

    let html_snapshot = matches!(content_type, ContentType::Html).then(|| extract_metadata_snapshot(body));
    let metadata = build_metadata(&raw, html_snapshot.as_ref());
    let detected_language = quality::detect_language(&raw.main_text);
    let quality_score = quality::quality_score(&raw.main_text, &raw.elements, &metadata);

    ExtractedContent {
        main_text: raw.main_text,
        source_url: source_url.to_string(),
        metadata,
        structured_elements: raw.elements,
        images: raw.images,
        links: raw.links,
        quality_score,
        extraction_time_ms: started.elapsed().as_millis() as u64,
        extracted_at: Utc::now(),
        detected_language,
        content_type,
        warnings,
    }
}

fn build_metadata(
    raw: &raw::RawExtraction,
    html_snapshot: Option<&webchunk_common::types::HtmlMetadataSnapshot>,
) -> WebContentMetadata {
    let mut metadata = WebContentMetadata::default();
    metadata.title = raw.title.clone();

    if let Some(snapshot) = html_snapshot {
        if metadata.title.is_none() {
            metadata.title = snapshot.open_graph.as_ref().and_then(|og| og.title.clone());
        }
        metadata.description = snapshot
            .meta_tags
            .get("description")
            .or_else(|| snapshot.open_graph.as_ref().and_then(|og| og.description.as_ref()))
            .cloned();
        metadata.author = snapshot.meta_tags.get("author").cloned();
        metadata.published_at = snapshot
            .meta_tags
            .get("article:published_time")
            .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        metadata.keywords = snapshot
            .meta_tags
            .get("keywords")
            .map(|kw| kw.split(',').map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect())
            .unwrap_or_default();
        for (key, value) in &snapshot.meta_tags {
            metadata.extra.insert(key.clone(), value.clone());
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_html_end_to_end() {
        let body = r#"<!doctype html><html><head>
            <title>Doc Title</title>
            <meta name="description" content="A test page">
            <meta property="og:title" content="Doc Title">
        </head><body><h1>Heading</h1><p>Some body text here for extraction.</p></body></html>"#;
        let result = extract(body, "https://example.com/doc", Some("text/html"));
        assert_eq!(result.content_type, ContentType::Html);
        assert_eq!(result.metadata.title.as_deref(), Some("Doc Title"));
        assert_eq!(result.metadata.description.as_deref(), Some("A test page"));
        assert!(result.main_text.contains("Heading"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn extracts_markdown_without_html_snapshot() {
        let body = "# Title\n\nSome markdown content.\n";
        let result = extract(body, "https://example.com/doc.md", Some("text/markdown"));
        assert_eq!(result.content_type, ContentType::Markdown);
        assert_eq!(result.metadata.title.as_deref(), Some("Title"));
    }

    #[test]
    fn empty_content_produces_warning() {
        let result = extract("", "https://example.com/empty", Some("text/plain"));
        assert!(!result.warnings.is_empty());
    }
}
