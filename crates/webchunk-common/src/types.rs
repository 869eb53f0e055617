//! Shared data model (spec §3). Every entity here is created inside a
//! pipeline stage, flows forward through bounded channels, and is never
//! mutated once it leaves its producing stage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sniffed/declared shape of a page's source content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Html,
    Markdown,
    Json,
    Xml,
    PlainText,
    Unknown,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Unknown
    }
}

/// A single discovered image on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    /// Offset in `mainText` the image was encountered near.
    pub position: usize,
    /// Up to 200 chars of surrounding text.
    pub surrounding_text: String,
}

/// A single discovered link on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRef {
    pub href: String,
    pub text: String,
    pub is_internal: bool,
    pub is_anchor: bool,
    pub is_email: bool,
    pub is_phone: bool,
    pub position: usize,
}

/// Kind of a structured element in document order (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Header,
    Paragraph,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    CodeBlock,
    Blockquote,
    Divider,
    Other,
}

/// A DFS-ordered semantic block extracted from a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredElement {
    pub kind: ElementKind,
    pub content: String,
    /// Heading level 1..=6, only meaningful for `ElementKind::Header`.
    pub level: Option<u8>,
    pub attributes: HashMap<String, String>,
    /// Offset into the owning `mainText`; each child's position is strictly
    /// greater than its parent's.
    pub position: usize,
    pub children: Vec<StructuredElement>,
}

impl StructuredElement {
    pub fn leaf(kind: ElementKind, content: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            content: content.into(),
            level: None,
            attributes: HashMap::new(),
            position,
            children: Vec::new(),
        }
    }
}

/// OpenGraph fields, present only if `og:title` was found (spec §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenGraphMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub site_name: Option<String>,
    pub og_type: Option<String>,
}

/// Twitter Card fields, present only if `twitter:card` was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwitterCardMetadata {
    pub card: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Synchronous structural metadata snapshot (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlMetadataSnapshot {
    pub meta_tags: HashMap<String, String>,
    pub open_graph: Option<OpenGraphMetadata>,
    pub twitter_card: Option<TwitterCardMetadata>,
    /// JSON-LD blocks indexed by `@type`; duplicates overwrite silently.
    pub structured_data: HashMap<String, Value>,
    pub extracted_at: DateTime<Utc>,
}

impl HtmlMetadataSnapshot {
    pub fn empty() -> Self {
        Self {
            meta_tags: HashMap::new(),
            open_graph: None,
            twitter_card: None,
            structured_data: HashMap::new(),
            extracted_at: Utc::now(),
        }
    }
}

/// Page-level metadata surfaced by the extractor (title, description, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebContentMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub keywords: Vec<String>,
    pub extra: HashMap<String, String>,
}

/// The result of fetching one URL (spec §3 `CrawlResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub is_success: bool,
    pub content: String,
    pub headers: HashMap<String, String>,
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub content_length: usize,
    pub response_time_ms: u64,
    pub crawled_at: DateTime<Utc>,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub discovered_links: Vec<String>,
    pub image_urls: Vec<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<crate::error::PipelineErrorKind>,
    pub metadata: HashMap<String, String>,
    pub web_metadata: Option<HtmlMetadataSnapshot>,
}

impl CrawlResult {
    pub fn failed(url: String, depth: u32, parent_url: Option<String>, kind: crate::error::PipelineErrorKind) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status_code: 0,
            is_success: false,
            content: String::new(),
            headers: HashMap::new(),
            content_type: None,
            encoding: None,
            content_length: 0,
            response_time_ms: 0,
            crawled_at: Utc::now(),
            depth,
            parent_url,
            discovered_links: Vec::new(),
            image_urls: Vec::new(),
            error_message: Some(kind.to_string()),
            error_kind: Some(kind),
            metadata: HashMap::new(),
            web_metadata: None,
        }
    }
}

/// Fully extracted page content (spec §3 `ExtractedContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub main_text: String,
    pub source_url: String,
    pub metadata: WebContentMetadata,
    pub structured_elements: Vec<StructuredElement>,
    pub images: Vec<ImageRef>,
    pub links: Vec<LinkRef>,
    pub quality_score: f32,
    pub extraction_time_ms: u64,
    pub extracted_at: DateTime<Utc>,
    pub detected_language: Option<String>,
    pub content_type: ContentType,
    pub warnings: Vec<String>,
}

/// Output of the optional AI enhancement stage (spec §3 `EnhancedContent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedContent {
    pub original: ExtractedContent,
    pub summary: Option<String>,
    pub rewritten: Option<String>,
    pub enriched_metadata: Option<Value>,
}

/// A strategy name (spec §3 `ChunkingOptions.strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkingStrategyKind {
    Auto,
    FixedSize,
    Paragraph,
    Smart,
    Semantic,
    Intelligent,
    MemoryOptimized,
    DomStructure,
}

impl ChunkingStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategyKind::Auto => "auto",
            ChunkingStrategyKind::FixedSize => "fixed_size",
            ChunkingStrategyKind::Paragraph => "paragraph",
            ChunkingStrategyKind::Smart => "smart",
            ChunkingStrategyKind::Semantic => "semantic",
            ChunkingStrategyKind::Intelligent => "intelligent",
            ChunkingStrategyKind::MemoryOptimized => "memory_optimized",
            ChunkingStrategyKind::DomStructure => "dom_structure",
        }
    }
}

/// Options controlling chunking (spec §3 `ChunkingOptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub strategy: ChunkingStrategyKind,
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub semantic_threshold: f32,
    pub preserve_structure: bool,
    pub buffer_size_bytes: usize,
    pub context_window_size: usize,
    /// Free-form per-strategy knobs, e.g. `"use_tokens" -> "true"`,
    /// `"heading_cap" -> "3"`, `"semantic_merge_uses_strict_threshold" ->
    /// "true"` (open question in spec §9 — default is the stricter reading).
    pub strategy_parameters: HashMap<String, String>,
}

impl ChunkingOptions {
    pub fn use_tokens(&self) -> bool {
        self.strategy_parameters
            .get("use_tokens")
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn heading_cap(&self) -> u8 {
        self.strategy_parameters
            .get("heading_cap")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    }

    /// Open question (spec §9): whether the semantic post-merge compares
    /// against `semantic_threshold` or `semantic_threshold + 0.1`. Default
    /// to the stricter reading (`+ 0.1`) unless explicitly overridden.
    pub fn semantic_merge_threshold(&self) -> f32 {
        if self.strategy_parameters.get("semantic_merge_strict").map(|v| v == "false").unwrap_or(false) {
            self.semantic_threshold
        } else {
            self.semantic_threshold + 0.1
        }
    }
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategyKind::Auto,
            max_chunk_size: 1024,
            min_chunk_size: 100,
            overlap_size: 100,
            semantic_threshold: 0.5,
            preserve_structure: true,
            buffer_size_bytes: 1024 * 1024,
            context_window_size: 4096,
            strategy_parameters: HashMap::new(),
        }
    }
}

/// A single emitted chunk (spec §3 `WebContentChunk`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebContentChunk {
    pub chunk_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub source_url: String,
    pub start_position: usize,
    pub end_position: usize,
    pub additional_metadata: HashMap<String, Value>,
    pub content_type: ContentType,
    pub strategy_used: ChunkingStrategyKind,
}

/// Crawl traversal order (spec §3 `CrawlOptions.strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStrategyKind {
    BreadthFirst,
    DepthFirst,
    Sitemap,
    Single,
}

/// Options controlling a crawl (spec §3 `CrawlOptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub max_depth: u32,
    pub max_pages: usize,
    pub delay_ms: u64,
    pub respect_robots_txt: bool,
    pub user_agent: String,
    pub allowed_domains: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub max_concurrent_requests: usize,
    pub timeout_seconds: u64,
    pub retry_count: u32,
    pub strategy: CrawlStrategyKind,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            delay_ms: 500,
            respect_robots_txt: true,
            user_agent: "webchunk/0.1 (+https://example.invalid/bot)".to_string(),
            allowed_domains: Vec::new(),
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            max_concurrent_requests: 4,
            timeout_seconds: 30,
            retry_count: 3,
            strategy: CrawlStrategyKind::BreadthFirst,
        }
    }
}

/// Progress snapshot published by the orchestrator (spec §3/§4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingProgress {
    pub job_id: String,
    pub progress: f32,
    pub current_stage: String,
    pub processed_pages: usize,
    pub total_pages: Option<usize>,
    pub generated_chunks: usize,
    pub processing_rate: f32,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub errors: Vec<String>,
}
