//! C8: AI Enhancement Service (spec §4.8). Composes the host-supplied
//! completion/metadata services into the four optional enhancement
//! operations and aggregates them into `EnhancedContent`.

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use webchunk_common::error::PipelineErrorKind;
use webchunk_common::types::{EnhancedContent, ExtractedContent};

use crate::traits::{CompletionOptions, MetadataSchema, ResponseFormat, TextCompletionService, WebMetadataExtractor};

/// Which sub-operations to run; all default to off so a caller opts in
/// explicitly to the (costlier) AI calls it actually wants.
#[derive(Debug, Clone, Default)]
pub struct EnhancementOptions {
    pub summarize: bool,
    pub rewrite: bool,
    pub extract_metadata: bool,
    pub summary_max_words: usize,
    pub rewrite_instruction: Option<String>,
    pub metadata_schema: MetadataSchema,
    pub custom_metadata_prompt: Option<String>,
}

impl Default for MetadataSchema {
    fn default() -> Self {
        MetadataSchema::General
    }
}

const STRICT_JSON_SUFFIX: &str = "\n\nRespond with JSON only. No prose, no markdown fences, no commentary.";

pub struct AiEnhancementService {
    completion: Option<Arc<dyn TextCompletionService>>,
    metadata_extractor: Option<Arc<dyn WebMetadataExtractor>>,
}

impl AiEnhancementService {
    pub fn new(
        completion: Option<Arc<dyn TextCompletionService>>,
        metadata_extractor: Option<Arc<dyn WebMetadataExtractor>>,
    ) -> Self {
        Self { completion, metadata_extractor }
    }

    #[instrument(skip(self, content, options), fields(url = %content.source_url))]
    pub async fn enhance(
        &self,
        content: ExtractedContent,
        options: &EnhancementOptions,
    ) -> Result<EnhancedContent, PipelineErrorKind> {
        let summary = if options.summarize {
            self.summarize(&content.main_text, options.summary_max_words).await?
        } else {
            None
        };

        let rewritten = if options.rewrite {
            self.rewrite(&content.main_text, options.rewrite_instruction.as_deref()).await?
        } else {
            None
        };

        let enriched_metadata = if options.extract_metadata {
            self.extract_metadata(
                &content.main_text,
                &content.source_url,
                options.metadata_schema,
                options.custom_metadata_prompt.as_deref(),
            )
            .await?
        } else {
            None
        };

        Ok(EnhancedContent { original: content, summary, rewritten, enriched_metadata })
    }

    /// Skipped (returns `Ok(None)`) when no completion service is wired.
    pub async fn summarize(&self, text: &str, max_words: usize) -> Result<Option<String>, PipelineErrorKind> {
        let Some(completion) = &self.completion else { return Ok(None) };
        let cap = if max_words == 0 { 150 } else { max_words };
        let prompt = format!(
            "Summarize the following content in at most {cap} words. Preserve the key facts, \
             drop filler and boilerplate.\n\n---\n{text}"
        );
        let options = CompletionOptions { temperature: 0.3, ..Default::default() };
        let summary = completion.complete(&prompt, &options).await?;
        Ok(Some(summary.trim().to_string()))
    }

    pub async fn rewrite(&self, text: &str, instruction: Option<&str>) -> Result<Option<String>, PipelineErrorKind> {
        let Some(completion) = &self.completion else { return Ok(None) };
        let instruction = instruction.unwrap_or("Rewrite the content for clarity and concision, preserving all facts.");
        let prompt = format!("{instruction}\n\n---\n{text}");
        let options = CompletionOptions { temperature: 0.3, ..Default::default() };
        let rewritten = completion.complete(&prompt, &options).await?;
        Ok(Some(rewritten.trim().to_string()))
    }

    /// Expects strict JSON from the completion service; on a parse failure
    /// retries once with a stricter instruction before surfacing
    /// [`PipelineErrorKind::AiParse`].
    pub async fn extract_metadata(
        &self,
        text: &str,
        url: &str,
        schema: MetadataSchema,
        custom_prompt: Option<&str>,
    ) -> Result<Option<Value>, PipelineErrorKind> {
        if let Some(extractor) = &self.metadata_extractor {
            return extractor.extract(text, url, None, schema, custom_prompt).await.map(Some);
        }

        let Some(completion) = &self.completion else { return Ok(None) };
        let prompt = metadata_prompt(text, url, schema, custom_prompt);
        let options = CompletionOptions {
            temperature: 0.3,
            response_format: Some(ResponseFormat::Json),
            ..Default::default()
        };

        let first = completion.complete(&prompt, &options).await?;
        if let Ok(value) = serde_json::from_str::<Value>(&first) {
            return Ok(Some(value));
        }

        let retry_prompt = format!("{prompt}{STRICT_JSON_SUFFIX}");
        let second = completion.complete(&retry_prompt, &options).await?;
        serde_json::from_str::<Value>(&second)
            .map(Some)
            .map_err(|e| PipelineErrorKind::AiParse(e.to_string()))
    }
}

fn metadata_prompt(text: &str, url: &str, schema: MetadataSchema, custom_prompt: Option<&str>) -> String {
    let schema_hint = match schema {
        MetadataSchema::General => {
            "Extract general metadata as JSON: {\"topics\": [string], \"entities\": [string], \"summary_tags\": [string]}"
        }
        MetadataSchema::TechnicalDoc => {
            "Extract technical-document metadata as JSON: {\"api_names\": [string], \"version\": string|null, \
             \"code_languages\": [string]}"
        }
        MetadataSchema::ProductManual => {
            "Extract product-manual metadata as JSON: {\"product_name\": string|null, \"model_numbers\": [string], \
             \"safety_warnings\": [string]}"
        }
        MetadataSchema::Article => {
            "Extract article metadata as JSON: {\"headline\": string|null, \"byline\": string|null, \
             \"key_points\": [string]}"
        }
        MetadataSchema::Custom => custom_prompt.unwrap_or("Extract metadata as JSON."),
    };
    format!("{schema_hint}\n\nSource URL: {url}\n\nContent:\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::Stream;

    use crate::traits::ServiceHealth;

    struct StubCompletion {
        responses: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextCompletionService for StubCompletion {
        async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, PipelineErrorKind> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[idx.min(self.responses.len() - 1)].to_string())
        }

        async fn complete_stream(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Pin<Box<dyn Stream<Item = Result<String, PipelineErrorKind>> + Send>>, PipelineErrorKind> {
            unimplemented!("not exercised in these tests")
        }

        fn is_available(&self) -> bool {
            true
        }

        fn get_health(&self) -> ServiceHealth {
            ServiceHealth { healthy: true, detail: None }
        }
    }

    #[tokio::test]
    async fn summarize_without_completion_service_is_skipped() {
        let service = AiEnhancementService::new(None, None);
        let result = service.summarize("text", 50).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn summarize_trims_completion_output() {
        let completion = Arc::new(StubCompletion { responses: vec!["  a short summary  "], calls: AtomicUsize::new(0) });
        let service = AiEnhancementService::new(Some(completion), None);
        let result = service.summarize("long text here", 50).await.unwrap();
        assert_eq!(result.as_deref(), Some("a short summary"));
    }

    #[tokio::test]
    async fn metadata_extraction_retries_once_on_parse_failure() {
        let completion =
            Arc::new(StubCompletion { responses: vec!["not json", r#"{"topics": ["a"]}"#], calls: AtomicUsize::new(0) });
        let service = AiEnhancementService::new(Some(completion), None);
        let result = service
            .extract_metadata("content", "https://example.com", MetadataSchema::General, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["topics"][0], "a");
    }

    #[tokio::test]
    async fn metadata_extraction_surfaces_ai_parse_after_two_failures() {
        let completion = Arc::new(StubCompletion { responses: vec!["nope", "still not json"], calls: AtomicUsize::new(0) });
        let service = AiEnhancementService::new(Some(completion), None);
        let err = service
            .extract_metadata("content", "https://example.com", MetadataSchema::General, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineErrorKind::AiParse(_)));
    }
}
