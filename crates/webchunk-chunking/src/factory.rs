//! C10: Chunking Factory (spec §4.10). Strategy registration is static;
//! `CreateOptimal` delegates to the `Auto` strategy's own decision logic
//! rather than duplicating it here.

use webchunk_common::types::ChunkingStrategyKind;

use crate::strategies::for_kind;
use crate::strategy::ChunkStrategy;

pub const AVAILABLE_STRATEGIES: &[ChunkingStrategyKind] = &[
    ChunkingStrategyKind::Auto,
    ChunkingStrategyKind::FixedSize,
    ChunkingStrategyKind::Paragraph,
    ChunkingStrategyKind::Smart,
    ChunkingStrategyKind::DomStructure,
    ChunkingStrategyKind::Semantic,
    ChunkingStrategyKind::Intelligent,
    ChunkingStrategyKind::MemoryOptimized,
];

pub struct ChunkingFactory;

impl ChunkingFactory {
    pub fn create_strategy(kind: ChunkingStrategyKind) -> Box<dyn ChunkStrategy> {
        for_kind(kind)
    }

    pub fn create_optimal() -> Box<dyn ChunkStrategy> {
        for_kind(ChunkingStrategyKind::Auto)
    }

    pub fn get_available_strategies() -> &'static [ChunkingStrategyKind] {
        AVAILABLE_STRATEGIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_available_strategy_resolves() {
        for &kind in AVAILABLE_STRATEGIES {
            let strategy = ChunkingFactory::create_strategy(kind);
            assert_eq!(strategy.name(), kind);
        }
    }
}
