//! Chunk-output quality scoring used by the `Auto` strategy's retry
//! decision (spec §4.9): mean of size-in-range, sentence-boundary, and
//! heading-preservation ratios.

use webchunk_common::types::WebContentChunk;

pub fn score_chunks(chunks: &[WebContentChunk], min_size: usize, max_size: usize) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }

    let in_range = chunks.iter().filter(|c| c.content.len() >= min_size && c.content.len() <= max_size).count();
    let size_ratio = in_range as f32 / chunks.len() as f32;

    let on_sentence = chunks
        .iter()
        .filter(|c| {
            let trimmed = c.content.trim_end();
            trimmed.ends_with(['.', '!', '?']) || trimmed.is_empty()
        })
        .count();
    let boundary_ratio = on_sentence as f32 / chunks.len() as f32;

    let with_heading = chunks.iter().filter(|c| c.additional_metadata.contains_key("heading_path")).count();
    let heading_ratio = if chunks.iter().any(|c| c.additional_metadata.contains_key("heading_path")) {
        with_heading as f32 / chunks.len() as f32
    } else {
        1.0
    };

    (size_ratio + boundary_ratio + heading_ratio) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use webchunk_common::types::{ChunkingStrategyKind, ContentType};

    fn chunk(content: &str) -> WebContentChunk {
        WebContentChunk {
            chunk_id: "id".to_string(),
            chunk_index: 0,
            content: content.to_string(),
            source_url: "https://example.com".to_string(),
            start_position: 0,
            end_position: content.len(),
            additional_metadata: Default::default(),
            content_type: ContentType::PlainText,
            strategy_used: ChunkingStrategyKind::FixedSize,
        }
    }

    #[test]
    fn empty_chunks_score_zero() {
        assert_eq!(score_chunks(&[], 10, 100), 0.0);
    }

    #[test]
    fn well_formed_chunk_scores_highly() {
        let chunks = vec![chunk("A complete sentence that ends properly.")];
        let score = score_chunks(&chunks, 10, 200);
        assert!(score > 0.6);
    }
}
