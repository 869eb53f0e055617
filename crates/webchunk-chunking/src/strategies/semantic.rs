use async_trait::async_trait;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::tokens::counter_for;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ExtractedContent, WebContentChunk};

use crate::sizing::overlap_tail;
use crate::strategy::{new_chunk, ChunkStrategy, ChunkingServices};

const EMBEDDING_BATCH: usize = 32;

pub struct SemanticStrategy;

#[async_trait]
impl ChunkStrategy for SemanticStrategy {
    fn name(&self) -> ChunkingStrategyKind {
        ChunkingStrategyKind::Semantic
    }

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        let Some(embedding) = &services.embedding else {
            return Err(PipelineErrorKind::EmbeddingUnavailable);
        };

        let sentences = split_sentences(&content.main_text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(sentences.len());
        for batch in sentences.chunks(EMBEDDING_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.to_string()).collect();
            let vectors = embedding.get_embeddings(&texts).await?;
            embeddings.extend(vectors);
        }

        let mut groups: Vec<Vec<usize>> = vec![vec![0]];
        for i in 1..sentences.len() {
            let similarity = cosine_similarity(&embeddings[i - 1], &embeddings[i]);
            if similarity < options.semantic_threshold {
                groups.push(vec![i]);
            } else {
                groups.last_mut().unwrap().push(i);
            }
        }

        let counter = counter_for(options.use_tokens());
        let merge_threshold = options.semantic_merge_threshold();
        let mut merged: Vec<Vec<usize>> = Vec::new();
        for group in groups {
            if let Some(prev) = merged.last() {
                let prev_text = group_text(&sentences, prev);
                let cur_text = group_text(&sentences, &group);
                let combined_size = counter.count_tokens(&prev_text) + counter.count_tokens(&cur_text);
                let boundary_similarity = cosine_similarity(
                    &embeddings[*prev.last().unwrap()],
                    &embeddings[*group.first().unwrap()],
                );
                if combined_size <= options.max_chunk_size && boundary_similarity >= merge_threshold {
                    let last = merged.last_mut().unwrap();
                    last.extend(group);
                    continue;
                }
            }
            merged.push(group);
        }

        let mut chunks = Vec::new();
        let mut previous_tail: Option<String> = None;
        for (index, group) in merged.iter().enumerate() {
            let mut text = group_text(&sentences, group);
            let start = sentences[*group.first().unwrap()].0;
            let last_idx = *group.last().unwrap();
            let end = sentences[last_idx].0 + sentences[last_idx].1.len();

            if let Some(tail) = previous_tail.take() {
                text = format!("{tail}{text}");
            }
            if options.overlap_size > 0 {
                previous_tail = Some(overlap_tail(&text, options.overlap_size, counter.as_ref()).to_string());
            }

            chunks.push(new_chunk(
                &content.source_url,
                index,
                text,
                start,
                end,
                content.content_type,
                ChunkingStrategyKind::Semantic,
            ));
        }

        Ok(chunks)
    }
}

fn group_text(sentences: &[(usize, &str)], group: &[usize]) -> String {
    group.iter().map(|&i| sentences[i].1).collect::<Vec<_>>().join(" ")
}

/// Splits on `.`/`!`/`?` followed by whitespace; returns (byte offset, text).
pub fn split_sentences(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if matches!(c, b'.' | b'!' | b'?') {
            let next_is_space = bytes.get(i + 1).map(|b| b.is_ascii_whitespace()).unwrap_or(true);
            if next_is_space {
                let end = i + 1;
                let slice = text[start..end].trim();
                if !slice.is_empty() {
                    let offset = start + text[start..end].find(slice).unwrap_or(0);
                    out.push((offset, slice));
                }
                start = end;
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        let offset = start + text[start..].find(tail).unwrap_or(0);
        out.push((offset, tail));
    }
    out
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_terminators() {
        let sentences = split_sentences("First one. Second one! Third one?");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].1, "First one.");
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }
}
