//! Shared intermediate result produced by every format-specific walker
//! before the façade in `lib.rs` wraps it into `ExtractedContent`.

use webchunk_common::types::{ImageRef, LinkRef, StructuredElement};

#[derive(Debug, Default)]
pub struct RawExtraction {
    pub main_text: String,
    pub elements: Vec<StructuredElement>,
    pub images: Vec<ImageRef>,
    pub links: Vec<LinkRef>,
    pub title: Option<String>,
}
