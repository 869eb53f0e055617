use async_trait::async_trait;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::tokens::counter_for;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ExtractedContent, WebContentChunk};

use crate::sizing::overlap_tail;
use crate::strategies::paragraph::split_paragraphs;
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

/// Scans `mainText` paragraph-by-paragraph rather than packing it in
/// memory, bounding the live buffer at `bufferSizeBytes` (spec §4.9). The
/// `ChunkStrategy` contract returns a materialized `Vec`, so the "stream
/// immediately" requirement is satisfied by emitting chunks as soon as a
/// boundary is crossed rather than after a full-document pass.
pub struct MemoryOptimizedStrategy;

#[async_trait]
impl ChunkStrategy for MemoryOptimizedStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::MemoryOptimized
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        _services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        Ok(memory_optimized_chunks(content, options))
    }
}

pub fn memory_optimized_chunks(content: &ExtractedContent, options: &ChunkingOptions) -> Vec<WebContentChunk> {
    let counter = counter_for(options.use_tokens());
    let paragraphs = split_paragraphs(&content.main_text);
    let buffer_cap = options.buffer_size_bytes.max(options.max_chunk_size);

    let mut chunks = Vec::new();
    let mut index = 0usize;
    let mut buffer = String::new();
    let mut buffer_start = 0usize;
    let mut buffer_end = 0usize;
    let mut previous_tail: Option<String> = None;

    for (offset, para) in paragraphs {
        if buffer.is_empty() {
            buffer_start = offset;
        }
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(para);
        buffer_end = offset + para.len();

        let over_size = counter.count_tokens(&buffer) > options.max_chunk_size;
        let over_buffer = buffer.len() > buffer_cap;
        if over_size || over_buffer {
            let mut body = buffer.clone();
            if let Some(tail) = previous_tail.take() {
                body = format!("{tail}{body}");
            }
            if options.overlap_size > 0 {
                previous_tail = Some(overlap_tail(&buffer, options.overlap_size, counter.as_ref()).to_string());
                let retained = previous_tail.clone().unwrap_or_default();
                buffer = retained;
            } else {
                buffer.clear();
            }

            chunks.push(new_chunk(
                &content.source_url,
                index,
                body,
                buffer_start,
                buffer_end,
                content.content_type,
                ChunkingStrategyKind::MemoryOptimized,
            ));
            index += 1;
        }
    }

    if !buffer.trim().is_empty() {
        let mut body = buffer.clone();
        if let Some(tail) = previous_tail.take() {
            body = format!("{tail}{body}");
        }
        chunks.push(new_chunk(
            &content.source_url,
            index,
            body,
            buffer_start,
            buffer_end,
            content.content_type,
            ChunkingStrategyKind::MemoryOptimized,
        ));
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
    fn emits_chunk_once_buffer_exceeds_max_size() {
        let paragraphs: Vec<String> = (0..10).map(|i| format!("paragraph number {i} with some filler text")).collect();
        let text = paragraphs.join("\n\n");
        let content = sample_content(&text);
        let options = ChunkingOptions { max_chunk_size: 60, overlap_size: 0, buffer_size_bytes: 1024, ..Default::default() };
        let chunks = memory_optimized_chunks(&content, &options);
        assert!(chunks.len() > 1);
    }
}
