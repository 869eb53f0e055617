pub mod auto;
pub mod fixed_size;
pub mod intelligent;
pub mod memory_optimized;
pub mod paragraph;
pub mod semantic;
pub mod smart;

use webchunk_common::types::ChunkingStrategyKind;

use crate::strategy::ChunkStrategy;

/// Resolves a concrete (non-`Auto`) strategy implementation by kind. `Auto`
/// itself calls back into this for each candidate in its decision order.
pub fn for_kind(kind: ChunkingStrategyKind) -> Box<dyn ChunkStrategy> {
    match kind {
        ChunkingStrategyKind::FixedSize => Box::new(fixed_size::FixedSizeStrategy),
        ChunkingStrategyKind::Paragraph => Box::new(paragraph::ParagraphStrategy),
        ChunkingStrategyKind::Smart => Box::new(smart::SmartStrategy::smart()),
        ChunkingStrategyKind::DomStructure => Box::new(smart::SmartStrategy::dom_structure()),
        ChunkingStrategyKind::Semantic => Box::new(semantic::SemanticStrategy),
        ChunkingStrategyKind::Intelligent => Box::new(intelligent::IntelligentStrategy),
        ChunkingStrategyKind::MemoryOptimized => Box::new(memory_optimized::MemoryOptimizedStrategy),
        ChunkingStrategyKind::Auto => Box::new(auto::AutoStrategy),
    }
}
