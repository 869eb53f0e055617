use async_trait::async_trait;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::tokens::counter_for;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ExtractedContent, WebContentChunk};

use crate::sizing::{snap_to_sentence_end, window_end};
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

pub struct FixedSizeStrategy;

#[async_trait]
impl ChunkStrategy for FixedSizeStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::FixedSize
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        _services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        Ok(fixed_size_chunks(content, options))
    }
}

pub fn fixed_size_chunks(content: &ExtractedContent, options: &ChunkingOptions) -> Vec<WebContentChunk> {
    let text = &content.main_text;
    let counter = counter_for(options.use_tokens());
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < text.len() {
        let raw_end = window_end(text, start, options.max_chunk_size, counter.as_ref());
        let end = if options.preserve_structure {
            snap_to_sentence_end(text, start, raw_end, 0.3).unwrap_or(raw_end)
        } else {
            raw_end
        };

        let piece = text[start..end].to_string();

        chunks.push(new_chunk(
            &content.source_url,
            index,
            piece,
            start,
            end,
            content.content_type,
            ChunkingStrategyKind::FixedSize,
        ));
        index += 1;

        let stride_size = options.max_chunk_size.saturating_sub(options.overlap_size).max(1);
        let next_start = window_end(text, start, stride_size, counter.as_ref());
        if next_start <= start {
            break;
        }
        start = next_start;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use webchunk_common::types::ContentType;

    fn sample_content(text: &str) -> ExtractedContent {
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
            content_type: ContentType::PlainText,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn windows_cover_entire_text() {
        let text = "a".repeat(250);
        let content = sample_content(&text);
        let options = ChunkingOptions { max_chunk_size: 100, overlap_size: 10, preserve_structure: false, ..Default::default() };
        let chunks = fixed_size_chunks(&content, &options);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.content.len() <= 110));
    }

    #[test]
    fn overlap_prefixes_next_chunk() {
        let text = "a".repeat(60).chars().chain("b".repeat(60).chars()).collect::<String>();
        let content = sample_content(&text);
        let options = ChunkingOptions { max_chunk_size: 60, overlap_size: 10, preserve_structure: false, ..Default::default() };
        let chunks = fixed_size_chunks(&content, &options);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].content.starts_with("aaaaaaaaaa"));
    }
}
