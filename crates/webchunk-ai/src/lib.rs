//! External AI service contracts (spec §6) and the C8 enhancement
//! service that composes them. The host implements `TextCompletionService`,
//! `TextEmbeddingService`, `ImageToTextService`, and `WebMetadataExtractor`;
//! nothing in this crate talks to a model provider directly.

pub mod enhancement;
pub mod traits;

pub use enhancement::{AiEnhancementService, EnhancementOptions};
pub use traits::{
    CompletionOptions, ImageExtractionType, ImageSource, ImageToTextOptions, ImageToTextService, MetadataSchema,
    ResponseFormat, ServiceHealth, TextCompletionService, TextEmbeddingService, WebMetadataExtractor,
};
