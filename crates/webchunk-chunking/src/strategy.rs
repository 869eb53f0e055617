use std::sync::Arc;

use async_trait::async_trait;

use webchunk_ai::{TextCompletionService, TextEmbeddingService};
use webchunk_common::error::PipelineErrorKind;
use webchunk_common::types::{ChunkingOptions, ChunkingStrategyKind, ContentType, ExtractedContent, WebContentChunk};

/// The AI collaborators a strategy may lean on. Both are optional; strategies
/// that need one and don't find it fail (Semantic) or fall back (Intelligent).
#[derive(Clone, Default)]
pub struct ChunkingServices {
    pub embedding: Option<Arc<dyn TextEmbeddingService>>,
    pub completion: Option<Arc<dyn TextCompletionService>>,
}

impl ChunkingServices {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }
}

#[async_trait]
pub trait ChunkStrategy: Send + Sync {
    fn name(&self) -> ChunkingStrategyKind;

    async fn chunk(
        &self,
        content: &ExtractedContent,
        options: &ChunkingOptions,
        services: &ChunkingServices,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind>;
}

pub(crate) fn new_chunk(
    source_url: &str,
    index: usize,
    content: String,
    start_position: usize,
    end_position: usize,
    content_type: ContentType,
    strategy: ChunkingStrategyKind,
) -> WebContentChunk {
    WebContentChunk {
        chunk_id: format!("{}-{}", uuid::Uuid::new_v4(), index),
        chunk_index: index,
        content,
        source_url: source_url.to_string(),
        start_position,
        end_position,
        additional_metadata: Default::default(),
        content_type,
        strategy_used: strategy,
    }
}
