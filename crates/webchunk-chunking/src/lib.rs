//! C9/C10: Chunking Strategies and Chunking Factory (spec §4.9/§4.10).

pub mod factory;
pub mod quality;
pub mod sizing;
pub mod strategies;
pub mod strategy;

pub use factory::ChunkingFactory;
pub use strategy::{ChunkStrategy, ChunkingServices};

use tracing::instrument;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::types::{ChunkingOptions, ExtractedContent, WebContentChunk};

/// Entry point mirroring the shared contract in spec §4.9:
/// `Chunk(ExtractedContent, ChunkingOptions) -> ordered WebContentChunk[]`.
#[instrument(skip(content, services), fields(url = %content.source_url, strategy = options.strategy.as_str()))]
pub async fn chunk(
    content: &ExtractedContent,
    options: &ChunkingOptions,
    services: &ChunkingServices,
) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
    let strategy = factory::ChunkingFactory::create_strategy(options.strategy);
    strategy.chunk(content, options, services).await
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

    #[tokio::test]
    async fn auto_strategy_produces_chunks_with_index_order() {
        let text = "Sentence one here. Sentence two here. Sentence three here.".repeat(20);
        let content = sample_content(&text);
        let options = ChunkingOptions { max_chunk_size: 200, overlap_size: 20, ..Default::default() };
        let services = ChunkingServices::default();
        let chunks = chunk(&content, &options, &services).await.unwrap();
        assert!(!chunks.is_empty());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
    }
}
