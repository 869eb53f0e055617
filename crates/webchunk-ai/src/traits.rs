//! External interfaces (spec §6): the host supplies implementations of
//! these traits; the core only ever calls through them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::Stream;

use webchunk_common::error::PipelineErrorKind;

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub response_format: Option<ResponseFormat>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.3,
            model: None,
            system_prompt: None,
            response_format: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    pub detail: Option<String>,
}

#[async_trait]
pub trait TextCompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, PipelineErrorKind>;

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<std::pin::Pin<Box<dyn Stream<Item = Result<String, PipelineErrorKind>> + Send>>, PipelineErrorKind>;

    fn is_available(&self) -> bool;

    fn get_health(&self) -> ServiceHealth;
}

#[async_trait]
pub trait TextEmbeddingService: Send + Sync {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, PipelineErrorKind>;

    async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineErrorKind>;

    fn max_tokens(&self) -> usize;

    fn embedding_dimension(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageExtractionType {
    Ocr,
    Description,
    Detailed,
}

#[derive(Debug, Clone)]
pub struct ImageToTextOptions {
    pub extraction_type: ImageExtractionType,
    pub language: Option<String>,
    pub detail_level: Option<String>,
    pub context_prompt: Option<String>,
    pub max_text_length: usize,
}

impl Default for ImageToTextOptions {
    fn default() -> Self {
        Self {
            extraction_type: ImageExtractionType::Description,
            language: None,
            detail_level: None,
            context_prompt: None,
            max_text_length: 2000,
        }
    }
}

pub enum ImageSource {
    Url(String),
    Bytes { data: Vec<u8>, mime_type: String },
}

#[async_trait]
pub trait ImageToTextService: Send + Sync {
    async fn convert_image_to_text(
        &self,
        source: ImageSource,
        options: &ImageToTextOptions,
    ) -> Result<String, PipelineErrorKind>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSchema {
    General,
    TechnicalDoc,
    ProductManual,
    Article,
    Custom,
}

#[async_trait]
pub trait WebMetadataExtractor: Send + Sync {
    async fn extract(
        &self,
        content: &str,
        url: &str,
        html_snapshot: Option<&webchunk_common::types::HtmlMetadataSnapshot>,
        schema: MetadataSchema,
        custom_prompt: Option<&str>,
    ) -> Result<Value, PipelineErrorKind>;
}
