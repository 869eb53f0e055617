//! Quality scoring and language detection shared by every format-specific
//! extractor (spec §4.6 steps 7-8).

use std::collections::HashSet;

use webchunk_common::types::{ElementKind, StructuredElement, WebContentMetadata};

const KIND_VARIANTS: f32 = 11.0;

/// `mainText length (normalized) * 0.5 + structural diversity * 0.3 +
/// metadata presence * 0.2`.
pub fn quality_score(main_text: &str, elements: &[StructuredElement], metadata: &WebContentMetadata) -> f32 {
    let length_score = (main_text.chars().count() as f32 / 2000.0).min(1.0);
    let diversity_score = distinct_kinds(elements) as f32 / KIND_VARIANTS;
    let metadata_score = metadata_presence(metadata);

    (length_score * 0.5 + diversity_score * 0.3 + metadata_score * 0.2).clamp(0.0, 1.0)
}

fn distinct_kinds(elements: &[StructuredElement]) -> usize {
    let mut seen = HashSet::new();
    let mut stack: Vec<&StructuredElement> = elements.iter().collect();
    while let Some(el) = stack.pop() {
        seen.insert(kind_tag(el.kind));
        stack.extend(el.children.iter());
    }
    seen.len()
}

fn kind_tag(kind: ElementKind) -> u8 {
    match kind {
        ElementKind::Header => 0,
        ElementKind::Paragraph => 1,
        ElementKind::List => 2,
        ElementKind::ListItem => 3,
        ElementKind::Table => 4,
        ElementKind::TableRow => 5,
        ElementKind::TableCell => 6,
        ElementKind::CodeBlock => 7,
        ElementKind::Blockquote => 8,
        ElementKind::Divider => 9,
        ElementKind::Other => 10,
    }
}

fn metadata_presence(metadata: &WebContentMetadata) -> f32 {
    let present = [
        metadata.title.is_some(),
        metadata.description.is_some(),
        metadata.author.is_some(),
        metadata.published_at.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    present as f32 / 4.0
}

const STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "of", "to", "in", "that", "it", "for", "with"]),
    ("es", &["el", "la", "de", "que", "y", "en", "los", "se", "un", "por"]),
    ("fr", &["le", "la", "de", "et", "les", "des", "un", "une", "que", "pour"]),
    ("de", &["der", "die", "und", "das", "ist", "den", "mit", "von", "zu", "ein"]),
];

/// Simple stopword-frequency language guess. Returns `None` for very short
/// text (spec: "empty if < 50 chars").
pub fn detect_language(main_text: &str) -> Option<String> {
    if main_text.chars().count() < 50 {
        return None;
    }
    let words: Vec<String> = main_text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;
    for (lang, stops) in STOPWORDS {
        let hits = words.iter().filter(|w| stops.contains(&w.as_str())).count();
        if best.map(|(_, best_hits)| hits > best_hits).unwrap_or(hits > 0) {
            best = Some((lang, hits));
        }
    }
    best.map(|(lang, _)| lang.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_has_no_detected_language() {
        assert_eq!(detect_language("too short"), None);
    }

    #[test]
    fn detects_english_by_stopword_frequency() {
        let text = "The quick brown fox and the lazy dog are friends, and it is for the best of all of them in time.";
        assert_eq!(detect_language(text), Some("en".to_string()));
    }

    #[test]
    fn quality_score_rewards_metadata_and_structure() {
        let elements = vec![
            StructuredElement::leaf(ElementKind::Header, "Title", 0),
            StructuredElement::leaf(ElementKind::Paragraph, "Body", 10),
            StructuredElement::leaf(ElementKind::List, "Item", 20),
        ];
        let mut metadata = WebContentMetadata::default();
        metadata.title = Some("Title".to_string());
        metadata.description = Some("Desc".to_string());

        let rich = quality_score(&"word ".repeat(500), &elements, &metadata);
        let poor = quality_score("short", &[], &WebContentMetadata::default());
        assert!(rich > poor);
    }
}
