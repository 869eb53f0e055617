//! Content-type sniffing for `ContentType::Unknown`/no declared type (spec
//! §4.6): leading markers decide Html/Json/Xml/Markdown, else PlainText.

use webchunk_common::types::ContentType;

pub fn sniff(body: &str, declared: Option<&str>) -> ContentType {
    if let Some(declared) = declared {
        let lower = declared.to_ascii_lowercase();
        if lower.contains("html") {
            return ContentType::Html;
        }
        if lower.contains("json") {
            return ContentType::Json;
        }
        if lower.contains("xml") {
            return ContentType::Xml;
        }
        if lower.contains("markdown") {
            return ContentType::Markdown;
        }
        if lower.contains("text/plain") {
            return ContentType::PlainText;
        }
    }

    let trimmed = body.trim_start();
    let lower_prefix: String = trimmed.chars().take(32).collect::<String>().to_ascii_lowercase();

    if lower_prefix.starts_with("<!doctype") || lower_prefix.starts_with("<html") {
        return ContentType::Html;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
            return ContentType::Json;
        }
    }
    if lower_prefix.starts_with("<?xml") || lower_prefix.starts_with("<root>") {
        return ContentType::Xml;
    }
    if looks_like_markdown(trimmed) {
        return ContentType::Markdown;
    }
    if trimmed.is_empty() {
        return ContentType::Unknown;
    }
    ContentType::PlainText
}

fn looks_like_markdown(body: &str) -> bool {
    body.lines().take(20).any(|line| {
        let t = line.trim_start();
        t.starts_with('#') || t.starts_with("* ") || t.starts_with("- ") || t.starts_with("```")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_html_by_doctype() {
        assert_eq!(sniff("<!doctype html><html></html>", None), ContentType::Html);
    }

    #[test]
    fn sniffs_json_by_leading_brace() {
        assert_eq!(sniff(r#"{"a": 1}"#, None), ContentType::Json);
    }

    #[test]
    fn sniffs_markdown_by_heading() {
        assert_eq!(sniff("# Title\n\nSome body text.", None), ContentType::Markdown);
    }

    #[test]
    fn falls_back_to_plain_text() {
        assert_eq!(sniff("just some words here", None), ContentType::PlainText);
    }
}
