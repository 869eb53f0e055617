use async_trait::async_trait;
use serde_json::json;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ContentType, ElementKind, ExtractedContent, WebContentChunk};

use crate::quality::score_chunks;
use crate::strategy::{ChunkStrategy, ChunkingServices};

const QUALITY_FLOOR: f32 = 0.7;

pub struct AutoStrategy;

#[async_trait]
impl ChunkStrategy for AutoStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::Auto
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        let order = decision_order(content, services);
        let primary = order[0];
        let mut chunks = run_strategy(primary, content, options, services).await?;
        annotate_strategy(&mut chunks, primary);

        let score = score_chunks(&chunks, options.min_chunk_size, options.max_chunk_size);
        if score < QUALITY_FLOOR {
            if let Some(&fallback) = order.iter().find(|s| **s != primary) {
                if let Ok(retry) = run_strategy(fallback, content, options, services).await {
                    let retry_score = score_chunks(&retry, options.min_chunk_size, options.max_chunk_size);
                    if retry_score > score {
                        let mut retry = retry;
                        annotate_strategy(&mut retry, fallback);
                        return Ok(retry);
                    }
                }
            }
        }

        Ok(chunks)
    }
}

fn annotate_strategy(chunks: &mut [WebContentChunk], kind: ChunkingStrategyKind) {
    for chunk in chunks {
        chunk.additional_metadata.insert("strategy".to_string(), json!(kind.as_str()));
    }
}

async fn run_strategy(
    kind: ChunkingStrategyKind,
    content: &ExtractedContent,
    options: &ChunkingOptions,
    services: &ChunkingServices,
) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
    super::for_kind(kind).chunk(content, options, services).await
}

/// Spec §4.9 decision order — first match wins; the rest of the list is
/// kept as fallback candidates for the post-hoc quality retry.
fn decision_order(content: &ExtractedContent, services: &ChunkingServices) -> Vec<ChunkingStrategyKind> {
    let length = content.main_text.len();
    let structure_score = structure_score(content);
    let has_embedding = services.has_embedding();
    let has_completion = services.has_completion();

    let mut order = Vec::new();

    if length > 100 * 1024 {
        order.push(ChunkingStrategyKind::MemoryOptimized);
    }
    if structure_score > 0.7 && matches!(content.content_type, ContentType::Html | ContentType::Markdown) {
        order.push(ChunkingStrategyKind::Smart);
    }
    if has_embedding && length > 2 * 1024 {
        order.push(ChunkingStrategyKind::Semantic);
    }
    if has_completion && length > 2 * 1024 {
        order.push(ChunkingStrategyKind::Intelligent);
    }
    if content.content_type == ContentType::Markdown || count_blank_line_paragraphs(&content.main_text) >= 2 {
        order.push(ChunkingStrategyKind::Paragraph);
    }
    order.push(ChunkingStrategyKind::FixedSize);

    order.dedup();
    order
}

fn structure_score(content: &ExtractedContent) -> f32 {
    let headings = content.structured_elements.iter().filter(|e| e.kind == ElementKind::Header).count();
    let tables = content.structured_elements.iter().filter(|e| e.kind == ElementKind::Table).count();
    let lists = content.structured_elements.iter().filter(|e| e.kind == ElementKind::List).count();

    let score = headings as f32 * 0.4 + (tables as f32 / 5.0) * 0.3 + (lists as f32 / 10.0) * 0.3;
    score.clamp(0.0, 1.0)
}

fn count_blank_line_paragraphs(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, content_type: ContentType) -> ExtractedContent {
        ExtractedContent {
            main_text: text.to_string(),
            source_url: "https://example.com/doc".to_string(),
            metadata: Default::default(),
            structured_elements: Vec::new(),
            images: Vec::new(),
            links: Vec::new(),
            quality_score: 0.0,
            extraction_time_ms: 0,
            extracted_at: chrono::Utc::now(),
            detected_language: None,
            content_type,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn short_plain_text_falls_back_to_fixed_size() {
        let content = sample("short text", ContentType::PlainText);
        let services = ChunkingServices::default();
        let order = decision_order(&content, &services);
        assert_eq!(order.last(), Some(&ChunkingStrategyKind::FixedSize));
        assert_eq!(order[0], ChunkingStrategyKind::FixedSize);
    }

    #[test]
    fn markdown_with_paragraphs_prefers_paragraph_strategy() {
        let content = sample("a\n\nb\n\nc", ContentType::Markdown);
        let services = ChunkingServices::default();
        let order = decision_order(&content, &services);
        assert_eq!(order[0], ChunkingStrategyKind::Paragraph);
    }

    #[test]
    fn huge_document_prefers_memory_optimized() {
        let text = "x".repeat(200 * 1024);
        let content = sample(&text, ContentType::PlainText);
        let services = ChunkingServices::default();
        let order = decision_order(&content, &services);
        assert_eq!(order[0], ChunkingStrategyKind::MemoryOptimized);
    }
}
