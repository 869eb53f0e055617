use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use webchunk_ai::CompletionOptions;
use webchunk_common::error::PipelineErrorKind;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ExtractedContent, WebContentChunk};

use crate::strategies::smart::smart_chunks;
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

const LOW_CONFIDENCE_FLOOR: f32 = 0.5;

#[derive(Debug, Deserialize)]
struct SplitPoint {
    position: usize,
    #[allow(dead_code)]
    reason: Option<String>,
    heading: Option<String>,
    confidence: f32,
}

pub struct IntelligentStrategy;

#[async_trait]
impl ChunkStrategy for IntelligentStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::Intelligent
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        let Some(completion) = &services.completion else {
            return Ok(smart_chunks(content, options, ChunkingStrategyKind::Smart));
        };

        let prompt = format!(
            "Analyze the following content and propose chunk split positions that respect natural \
             topic boundaries. Respond with a JSON array of objects: \
             [{{\"position\": int, \"reason\": string, \"heading\": string|null, \"confidence\": float}}]. \
             Positions are character offsets into the content, strictly increasing, starting after 0.\n\n\
             Content:\n{}",
            content.main_text
        );
        let completion_options = CompletionOptions {
            temperature: 0.2,
            response_format: Some(webchunk_ai::ResponseFormat::Json),
            ..Default::default()
        };

        let response = completion.complete(&prompt, &completion_options).await?;
        let Ok(points) = serde_json::from_str::<Vec<SplitPoint>>(&response) else {
            return Ok(smart_chunks(content, options, ChunkingStrategyKind::Smart));
        };

        if points.is_empty() {
            return Ok(smart_chunks(content, options, ChunkingStrategyKind::Smart));
        }

        let mean_confidence = points.iter().map(|p| p.confidence).sum::<f32>() / points.len() as f32;
        if mean_confidence < LOW_CONFIDENCE_FLOOR {
            return Ok(smart_chunks(content, options, ChunkingStrategyKind::Smart));
        }

        let mut positions: Vec<usize> = points
            .iter()
            .map(|p| p.position.min(content.main_text.len()))
            .filter(|p| *p > 0)
            .collect();
        positions.sort_unstable();
        positions.dedup();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;
        let boundaries: Vec<usize> = positions.into_iter().chain(std::iter::once(content.main_text.len())).collect();
        for end in boundaries {
            if end <= start {
                continue;
            }
            let safe_end = nearest_char_boundary(&content.main_text, end);
            let piece = content.main_text[start..safe_end].to_string();
            if piece.trim().is_empty() {
                start = safe_end;
                continue;
            }
            let mut chunk = new_chunk(
                &content.source_url,
                index,
                piece,
                start,
                safe_end,
                content.content_type,
                ChunkingStrategyKind::Intelligent,
            );
            if let Some(heading) = points.iter().find(|p| p.position == end).and_then(|p| p.heading.clone()) {
                chunk.additional_metadata.insert("heading".to_string(), json!(heading));
            }
            chunks.push(chunk);
            index += 1;
            start = safe_end;
        }

        Ok(chunks)
    }
}

fn nearest_char_boundary(text: &str, pos: usize) -> usize {
    let mut p = pos.min(text.len());
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_char_boundary_never_splits_multibyte() {
        let text = "héllo";
        for i in 0..=text.len() {
            let b = nearest_char_boundary(text, i);
            assert!(text.is_char_boundary(b));
        }
    }
}
