//! Networking fabric shared by the crawl stage and AI enhancement stage:
//! the fetcher (C2), domain rate limiter (C3), robots/sitemap/advisory
//! parsing (C4), and the resilience composition (C14).

pub mod fetcher;
pub mod llms_txt;
pub mod rate_limiter;
pub mod resilience;
pub mod robots;
pub mod sitemap;

pub use fetcher::{FetchResponse, HttpFetcher};
pub use llms_txt::{parse_key_value_txt, parse_llms_txt, parse_manifest_json, LlmsLink, LlmsTxt};
pub use rate_limiter::{DomainRateLimiter, RateLimiterStats};
pub use resilience::{Bulkhead, CircuitBreaker, ResiliencePolicy, ResilienceRegistry, ResilienceStats};
pub use robots::RobotsTxt;
pub use sitemap::{parse_sitemap, SitemapDocument, SitemapEntry};
