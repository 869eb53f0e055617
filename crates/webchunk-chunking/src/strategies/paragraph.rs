use async_trait::async_trait;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::tokens::counter_for;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ExtractedContent, WebContentChunk};

use crate::sizing::overlap_tail;
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

pub struct ParagraphStrategy;

#[async_trait]
impl ChunkStrategy for ParagraphStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::Paragraph
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        _services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        Ok(paragraph_chunks(content, options))
    }
}

pub fn split_paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    for block in text.split("\n\n") {
        let trimmed = block.trim();
        if !trimmed.is_empty() {
            let offset = pos + block.find(trimmed).unwrap_or(0);
            out.push((offset, trimmed));
        }
        pos += block.len() + 2;
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn flush_current(
    current: &mut String,
    current_start: usize,
    current_end: usize,
    index: &mut usize,
    chunks: &mut Vec<WebContentChunk>,
    previous_tail: &mut Option<String>,
    content: &ExtractedContent,
    options: &ChunkingOptions,
    counter: &dyn webchunk_common::tokens::TokenCounter,
) {
    if current.trim().is_empty() {
        return;
    }
    let mut body = current.clone();
    if let Some(tail) = previous_tail.take() {
        body = format!("{tail}{body}");
    }
    if options.overlap_size > 0 {
        *previous_tail = Some(overlap_tail(current, options.overlap_size, counter).to_string());
    }
    chunks.push(new_chunk(
        &content.source_url,
        *index,
        body,
        current_start,
        current_end,
        content.content_type,
        ChunkingStrategyKind::Paragraph,
    ));
    *index += 1;
    current.clear();
}

pub fn paragraph_chunks(content: &ExtractedContent, options: &ChunkingOptions) -> Vec<WebContentChunk> {
    let counter = counter_for(options.use_tokens());
    let paragraphs = split_paragraphs(&content.main_text);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_start = 0usize;
    let mut current_end = 0usize;
    let mut index = 0usize;
    let mut previous_tail: Option<String> = None;

    for (offset, para) in &paragraphs {
        let candidate_len = if current.is_empty() {
            counter.count_tokens(para)
        } else {
            counter.count_tokens(&current) + counter.count_tokens(para) + 2
        };

        if !current.is_empty() && candidate_len > options.max_chunk_size {
            flush_current(
                &mut current,
                current_start,
                current_end,
                &mut index,
                &mut chunks,
                &mut previous_tail,
                content,
                options,
                counter.as_ref(),
            );
        }

        if current.is_empty() {
            current_start = *offset;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
        current_end = offset + para.len();
    }
    flush_current(
        &mut current,
        current_start,
        current_end,
        &mut index,
        &mut chunks,
        &mut previous_tail,
        content,
        options,
        counter.as_ref(),
    );

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
    fn packs_paragraphs_until_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph that is somewhat longer than the others.";
        let content = sample_content(text);
        let options = ChunkingOptions { max_chunk_size: 40, overlap_size: 0, ..Default::default() };
        let chunks = paragraph_chunks(&content, &options);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn single_paragraph_fits_in_one_chunk() {
        let text = "Just one short paragraph.";
        let content = sample_content(text);
        let options = ChunkingOptions { max_chunk_size: 1024, overlap_size: 0, ..Default::default() };
        let chunks = paragraph_chunks(&content, &options);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
    }
}
