//! C5: the Crawler (spec §4.5) — four traversal modes over the networking
//! fabric in `webchunk-net`, emitting `CrawlResult` to a bounded channel.

pub mod crawler;
pub mod frontier;
pub mod link_filter;

pub use crawler::Crawler;
pub use frontier::{Frontier, FrontierItem};
