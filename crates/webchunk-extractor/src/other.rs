//! C6 (JSON/XML/PlainText branches): simpler formats get a flatter
//! structure than HTML/Markdown but the same `RawExtraction` shape.

use webchunk_common::types::{ElementKind, StructuredElement};

use crate::raw::RawExtraction;

pub fn extract_json(body: &str) -> RawExtraction {
    let pretty = serde_json::from_str::<serde_json::Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string());

    RawExtraction {
        elements: vec![StructuredElement::leaf(ElementKind::Other, pretty.clone(), 0)],
        main_text: pretty,
        images: Vec::new(),
        links: Vec::new(),
        title: None,
    }
}

pub fn extract_xml(body: &str) -> RawExtraction {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut main_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    if !text.trim().is_empty() {
                        if !main_text.is_empty() {
                            main_text.push('\n');
                        }
                        main_text.push_str(text.trim());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let elements = if main_text.is_empty() {
        Vec::new()
    } else {
        vec![StructuredElement::leaf(ElementKind::Other, main_text.clone(), 0)]
    };

    RawExtraction {
        main_text,
        elements,
        images: Vec::new(),
        links: Vec::new(),
        title: None,
    }
}

pub fn extract_plain_text(body: &str) -> RawExtraction {
    let main_text = body.trim().to_string();
    let elements = main_text
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .enumerate()
        .map(|(i, p)| StructuredElement::leaf(ElementKind::Paragraph, p.trim(), i))
        .collect();

    RawExtraction {
        main_text,
        elements,
        images: Vec::new(),
        links: Vec::new(),
        title: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_extraction_pretty_prints() {
        let result = extract_json(r#"{"a":1,"b":[1,2]}"#);
        assert!(result.main_text.contains('\n'));
    }

    #[test]
    fn xml_extraction_collects_text_nodes() {
        let result = extract_xml("<root><item>hello</item><item>world</item></root>");
        assert!(result.main_text.contains("hello"));
        assert!(result.main_text.contains("world"));
    }

    #[test]
    fn plain_text_splits_into_paragraphs() {
        let result = extract_plain_text("first paragraph\n\nsecond paragraph");
        assert_eq!(result.elements.len(), 2);
    }
}
