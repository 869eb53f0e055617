use async_trait::async_trait;
use serde_json::json;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::tokens::counter_for;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ElementKind, ExtractedContent, StructuredElement, WebContentChunk};

use crate::sizing::overlap_tail;
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

/// Walks `structuredElements`; shared by the `Smart` and `DomStructure`
/// strategy names (spec §4.9 treats them as one algorithm).
pub struct SmartStrategy {
    kind: ChunkingStrategyKind,
}

impl SmartStrategy {
    pub fn smart() -> Self {
        Self { kind: ChunkingStrategyKind::Smart }
    }

    pub fn dom_structure() -> Self {
        Self { kind: ChunkingStrategyKind::DomStructure }
    }
}

#[async_trait]
impl ChunkStrategy for SmartStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        self.kind
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        _services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        Ok(smart_chunks(content, options, self.kind))
    }
}

fn render_element(el: &StructuredElement) -> String {
    match el.kind {
        ElementKind::List => el
            .children
            .iter()
            .map(|item| format!("- {}", render_inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        ElementKind::Table => el
            .children
            .iter()
            .map(render_row)
            .collect::<Vec<_>>()
            .join("\n"),
        ElementKind::Blockquote => format!("> {}", render_inline(el)),
        ElementKind::Divider => "---".to_string(),
        _ if !el.children.is_empty() => el.children.iter().map(render_element).collect::<Vec<_>>().join("\n"),
        _ => el.content.clone(),
    }
}

fn render_inline(el: &StructuredElement) -> String {
    if el.children.is_empty() {
        el.content.clone()
    } else {
        el.children.iter().map(render_inline).collect::<Vec<_>>().join(" ")
    }
}

fn render_row(row: &StructuredElement) -> String {
    let cells = row.children.iter().map(|c| c.content.clone()).collect::<Vec<_>>();
    format!("| {} |", cells.join(" | "))
}

struct Section {
    buffer: String,
    start: Option<usize>,
    end: usize,
    heading_path: Vec<String>,
}

impl Section {
    fn new(heading_path: Vec<String>) -> Self {
        Self { buffer: String::new(), start: None, end: 0, heading_path }
    }

    fn push(&mut self, text: &str, position: usize) {
        if self.start.is_none() {
            self.start = Some(position);
        }
        if !self.buffer.is_empty() {
            self.buffer.push_str("\n\n");
        }
        self.buffer.push_str(text);
        self.end = position + text.len();
    }

    fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

pub fn smart_chunks(content: &ExtractedContent, options: &ChunkingOptions, kind: ChunkingStrategyKind) -> Vec<WebContentChunk> {
    let counter = counter_for(options.use_tokens());
    let cap = options.heading_cap();

    let mut chunks = Vec::new();
    let mut index = 0usize;
    let mut heading_path: Vec<String> = Vec::new();
    let mut section = Section::new(heading_path.clone());
    let mut previous_tail: Option<String> = None;

    macro_rules! flush_section {
        () => {
            if !section.is_empty() {
                let mut body = section.buffer.clone();
                if let Some(tail) = previous_tail.take() {
                    body = format!("{tail}{body}");
                }
                if options.overlap_size > 0 {
                    previous_tail = Some(overlap_tail(&section.buffer, options.overlap_size, counter.as_ref()).to_string());
                }
                let mut chunk = new_chunk(
                    &content.source_url,
                    index,
                    body,
                    section.start.unwrap_or(0),
                    section.end,
                    content.content_type,
                    kind,
                );
                if !section.heading_path.is_empty() {
                    chunk.additional_metadata.insert("heading_path".to_string(), json!(section.heading_path));
                }
                chunks.push(chunk);
                index += 1;
            }
            section = Section::new(heading_path.clone());
        };
    }

    for el in &content.structured_elements {
        if el.kind == ElementKind::Header {
            let level = el.level.unwrap_or(1);
            if (level as u8) <= cap {
                flush_section!();
                heading_path.truncate(level.saturating_sub(1) as usize);
                heading_path.push(el.content.clone());
                section = Section::new(heading_path.clone());
                section.push(&el.content, el.position);
                continue;
            }
        }

        let is_atomic = matches!(el.kind, ElementKind::Table | ElementKind::List | ElementKind::CodeBlock);
        let rendered = render_element(el);
        let rendered_size = counter.count_tokens(&rendered);

        if is_atomic && rendered_size > options.max_chunk_size {
            flush_section!();
            let mut chunk = new_chunk(
                &content.source_url,
                index,
                rendered.clone(),
                el.position,
                el.position + rendered.len(),
                content.content_type,
                kind,
            );
            chunk.additional_metadata.insert("oversized".to_string(), json!(true));
            if !heading_path.is_empty() {
                chunk.additional_metadata.insert("heading_path".to_string(), json!(heading_path));
            }
            chunks.push(chunk);
            index += 1;
            previous_tail = None;
            continue;
        }

        let current_size = counter.count_tokens(&section.buffer);
        if !section.is_empty() && current_size + rendered_size > options.max_chunk_size {
            flush_section!();
        }

        section.push(&rendered, el.position);
    }
    flush_section!();

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use webchunk_common::types::ContentType;

    fn sample_content(elements: Vec<StructuredElement>, text: &str) -> ExtractedContent {
        ExtractedContent {
            main_text: text.to_string(),
            source_url: "https://example.com/doc".to_string(),
            metadata: Default::default(),
            structured_elements: elements,
            images: Vec::new(),
            links: Vec::new(),
            quality_score: 0.0,
            extraction_time_ms: 0,
            extracted_at: chrono::Utc::now(),
            detected_language: None,
            content_type: ContentType::Html,
            warnings: Vec::new(),
        }
    }

    fn heading(level: u8, text: &str, pos: usize) -> StructuredElement {
        let mut el = StructuredElement::leaf(ElementKind::Header, text, pos);
        el.level = Some(level);
        el
    }

    fn paragraph(text: &str, pos: usize) -> StructuredElement {
        StructuredElement::leaf(ElementKind::Paragraph, text, pos)
    }

    #[test]
    fn opens_new_chunk_at_each_heading() {
        let elements = vec![
            heading(1, "Intro", 0),
            paragraph("Intro body.", 10),
            heading(2, "Details", 30),
            paragraph("Details body.", 45),
        ];
        let content = sample_content(elements, "Intro\n\nIntro body.\n\nDetails\n\nDetails body.");
        let options = ChunkingOptions { max_chunk_size: 1024, overlap_size: 0, ..Default::default() };
        let chunks = smart_chunks(&content, &options, ChunkingStrategyKind::Smart);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("Intro body"));
        assert!(chunks[1].content.contains("Details body"));
    }

    #[test]
    fn oversized_table_becomes_its_own_chunk() {
        let huge_cell = "x".repeat(200);
        let mut table = StructuredElement::leaf(ElementKind::Table, "", 0);
        let mut row = StructuredElement::leaf(ElementKind::TableRow, "", 0);
        row.children.push(StructuredElement::leaf(ElementKind::TableCell, huge_cell, 0));
        table.children.push(row);

        let elements = vec![table];
        let content = sample_content(elements, "table content");
        let options = ChunkingOptions { max_chunk_size: 50, overlap_size: 0, ..Default::default() };
        let chunks = smart_chunks(&content, &options, ChunkingStrategyKind::Smart);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].additional_metadata.get("oversized").and_then(|v| v.as_bool()), Some(true));
    }
}
