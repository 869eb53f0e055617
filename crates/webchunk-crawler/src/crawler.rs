//! C5: Crawler (spec §4.5). Drives fetching in one of four modes and emits
//! `CrawlResult` to a bounded output channel, applying robots.txt, the
//! domain rate limiter, and the resilience wrapper around every fetch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use scraper::{Html, Selector};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use webchunk_common::error::{CommonError, PipelineErrorKind};
use webchunk_common::types::{CrawlOptions, CrawlResult, CrawlStrategyKind};
use webchunk_common::url_normalize::{normalize, resolve, VisitedSet};
use webchunk_net::rate_limiter::DomainRateLimiter;
use webchunk_net::resilience::ResiliencePolicy;
use webchunk_net::robots::RobotsTxt;
use webchunk_net::sitemap::{parse_sitemap, SitemapDocument};
use webchunk_net::HttpFetcher;

use crate::frontier::{Frontier, FrontierItem};
use crate::link_filter::{domain_allowed, passes_patterns};

pub struct Crawler {
    fetcher: Arc<HttpFetcher>,
    rate_limiter: Arc<DomainRateLimiter>,
    resilience: Arc<ResiliencePolicy>,
    robots_cache: dashmap::DashMap<String, Option<Arc<RobotsTxt>>>,
}

impl Crawler {
    pub fn new(
        fetcher: Arc<HttpFetcher>,
        rate_limiter: Arc<DomainRateLimiter>,
        resilience: Arc<ResiliencePolicy>,
    ) -> Self {
        Self {
            fetcher,
            rate_limiter,
            resilience,
            robots_cache: dashmap::DashMap::new(),
        }
    }

    #[instrument(skip(self, options, out, cancel), fields(start_url = %start_url, strategy = ?options.strategy))]
    pub async fn crawl(
        &self,
        start_url: &str,
        options: &CrawlOptions,
        out: Sender<CrawlResult>,
        cancel: CancellationToken,
    ) -> Result<(), CommonError> {
        let visited = VisitedSet::new();
        match options.strategy {
            CrawlStrategyKind::Single => self.crawl_single(start_url, options, &out).await,
            CrawlStrategyKind::Sitemap => self.crawl_sitemap(start_url, options, &visited, &out, &cancel).await,
            CrawlStrategyKind::BreadthFirst => {
                self.crawl_frontier(start_url, options, Frontier::breadth_first(), &visited, &out, &cancel)
                    .await
            }
            CrawlStrategyKind::DepthFirst => {
                self.crawl_frontier(start_url, options, Frontier::depth_first(), &visited, &out, &cancel)
                    .await
            }
        }
    }

    async fn crawl_single(
        &self,
        start_url: &str,
        options: &CrawlOptions,
        out: &Sender<CrawlResult>,
    ) -> Result<(), CommonError> {
        let result = self.fetch_one(start_url, 0, None, options).await;
        let _ = out.send(result).await;
        Ok(())
    }

    async fn crawl_sitemap(
        &self,
        start_url: &str,
        options: &CrawlOptions,
        visited: &VisitedSet,
        out: &Sender<CrawlResult>,
        cancel: &CancellationToken,
    ) -> Result<(), CommonError> {
        let body = match self.raw_get(start_url).await {
            Ok(b) => b,
            Err(kind) => {
                let _ = out.send(CrawlResult::failed(start_url.to_string(), 0, None, kind)).await;
                return Ok(());
            }
        };

        let urls = match parse_sitemap(&body) {
            SitemapDocument::UrlSet(entries) => entries.into_iter().map(|e| e.url).collect::<Vec<_>>(),
            SitemapDocument::Index(children) => {
                let mut all = Vec::new();
                for child in children {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if let Ok(body) = self.raw_get(&child).await {
                        if let SitemapDocument::UrlSet(entries) = parse_sitemap(&body) {
                            all.extend(entries.into_iter().map(|e| e.url));
                        }
                    }
                }
                all
            }
        };

        let mut emitted = 0usize;
        for url in urls {
            if cancel.is_cancelled() || emitted >= options.max_pages {
                break;
            }
            let normalized = match normalize(&url) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if !visited.add(&normalized) {
                continue;
            }
            let result = self.fetch_one(&url, 0, None, options).await;
            emitted += 1;
            if out.send(result).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn crawl_frontier(
        &self,
        start_url: &str,
        options: &CrawlOptions,
        mut frontier: Frontier,
        visited: &VisitedSet,
        out: &Sender<CrawlResult>,
        cancel: &CancellationToken,
    ) -> Result<(), CommonError> {
        frontier.push(FrontierItem {
            url: start_url.to_string(),
            depth: 0,
            parent_url: None,
        });

        let mut emitted = 0usize;
        while !frontier.is_empty() && emitted < options.max_pages && !cancel.is_cancelled() {
            let Some(item) = frontier.pop() else { break };

            if item.depth > options.max_depth {
                continue;
            }
            let normalized = match normalize(&item.url) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if !visited.add(&normalized) {
                continue;
            }

            if options.respect_robots_txt {
                if let Some(false) = self.is_allowed(&item.url, &options.user_agent).await {
                    let result = CrawlResult::failed(
                        item.url.clone(),
                        item.depth,
                        item.parent_url.clone(),
                        PipelineErrorKind::RobotsDisallowed,
                    );
                    emitted += 1;
                    if out.send(result).await.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let mut result = self.fetch_one(&item.url, item.depth, item.parent_url.clone(), options).await;

            if result.is_success && item.depth < options.max_depth {
                if let Some(ct) = &result.content_type {
                    if ct.contains("html") || ct.contains("xml") {
                        let links = extract_links(&result.final_url, &result.content);
                        result.discovered_links = links.clone();
                        result.image_urls = extract_images(&result.final_url, &result.content);

                        for link in links {
                            if let Some(host) = Url::parse(&link).ok().and_then(|u| u.host_str().map(str::to_string)) {
                                if !domain_allowed(&host, &options.allowed_domains) {
                                    continue;
                                }
                            }
                            if !passes_patterns(&link, &options.include_patterns, &options.exclude_patterns) {
                                continue;
                            }
                            frontier.push(FrontierItem {
                                url: link,
                                depth: item.depth + 1,
                                parent_url: Some(result.final_url.clone()),
                            });
                        }
                    }
                }
            }

            emitted += 1;
            if out.send(result).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn is_allowed(&self, url: &str, user_agent: &str) -> Option<bool> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        let robots = self.robots_for_host(&parsed, &host).await;
        let robots = robots?;
        Some(robots.is_url_allowed(parsed.path(), user_agent))
    }

    async fn robots_for_host(&self, parsed: &Url, host: &str) -> Option<Arc<RobotsTxt>> {
        if let Some(cached) = self.robots_cache.get(host) {
            return cached.clone();
        }
        let robots_url = format!("{}://{}/robots.txt", parsed.scheme(), host);
        let robots = match self.fetcher.get_string(&robots_url, &HashMap::new()).await {
            Ok(body) => Some(Arc::new(RobotsTxt::parse(&body))),
            Err(_) => None,
        };
        self.robots_cache.insert(host.to_string(), robots.clone());
        robots
    }

    async fn fetch_one(
        &self,
        url: &str,
        depth: u32,
        parent_url: Option<String>,
        options: &CrawlOptions,
    ) -> CrawlResult {
        let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();

        if options.respect_robots_txt {
            if let Some(delay) = self.robots_cache.get(&host).and_then(|r| r.clone()).and_then(|r| r.get_crawl_delay(&options.user_agent)) {
                self.rate_limiter.set_domain_limit(&host, delay);
            }
        }

        let fetcher = self.fetcher.clone();
        let user_agent = options.user_agent.clone();
        let url_owned = url.to_string();

        let rate_limiter = self.rate_limiter.clone();
        let resilience = self.resilience.clone();

        let outcome = rate_limiter
            .execute(&host, || {
                let fetcher = fetcher.clone();
                let resilience = resilience.clone();
                let url_owned = url_owned.clone();
                let host = host.clone();
                async move {
                    resilience
                        .execute(&host, || {
                            let fetcher = fetcher.clone();
                            let url_owned = url_owned.clone();
                            async move {
                                let mut headers = HashMap::new();
                                headers.insert("User-Agent".to_string(), user_agent.clone());
                                fetcher.get(&url_owned, &headers).await
                            }
                        })
                        .await
                }
            })
            .await;

        match outcome {
            Ok(resp) => {
                debug!(url, status = resp.status_code, "fetched");
                CrawlResult {
                    url: url.to_string(),
                    final_url: resp.final_url,
                    status_code: resp.status_code,
                    is_success: resp.is_success(),
                    content: resp.body_string(),
                    headers: resp.headers,
                    content_type: resp.content_type,
                    encoding: None,
                    content_length: resp.body.len(),
                    response_time_ms: resp.response_time_ms,
                    crawled_at: Utc::now(),
                    depth,
                    parent_url,
                    discovered_links: Vec::new(),
                    image_urls: Vec::new(),
                    error_message: None,
                    error_kind: None,
                    metadata: HashMap::new(),
                    web_metadata: None,
                }
            }
            Err(kind) => {
                warn!(url, error = %kind, "fetch failed");
                CrawlResult::failed(url.to_string(), depth, parent_url, kind)
            }
        }
    }

    async fn raw_get(&self, url: &str) -> Result<String, PipelineErrorKind> {
        let host = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
        let fetcher = self.fetcher.clone();
        let url_owned = url.to_string();
        self.resilience
            .execute(&host, || {
                let fetcher = fetcher.clone();
                let url_owned = url_owned.clone();
                async move { fetcher.get_string(&url_owned, &HashMap::new()).await }
            })
            .await
    }
}

fn extract_links(base_url: &str, html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = std::collections::HashSet::new();
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve(base_url, href))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn extract_images(base_url: &str, html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| resolve(base_url, src))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_crawler() -> Crawler {
        let fetcher = Arc::new(HttpFetcher::with_default_timeout("test-crawler/1.0").unwrap());
        let rate_limiter = Arc::new(DomainRateLimiter::new(0));
        let resilience = Arc::new(ResiliencePolicy::new(5, Duration::from_secs(30), 8, 0, Duration::from_secs(5)));
        Crawler::new(fetcher, rate_limiter, resilience)
    }

    #[tokio::test]
    async fn breadth_first_discovers_linked_pages_within_depth() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><body><a href="{}/page">Page</a></body></html>"#,
                server.uri()
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>leaf</body></html>"))
            .mount(&server)
            .await;

        let crawler = make_crawler();
        let mut options = CrawlOptions::default();
        options.max_depth = 2;
        options.max_pages = 10;
        options.respect_robots_txt = false;

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let cancel = CancellationToken::new();
        crawler.crawl(&server.uri(), &options, tx, cancel).await.unwrap();

        let mut results = Vec::new();
        while let Some(r) = rx.recv().await {
            results.push(r);
        }
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_success));
    }

    #[tokio::test]
    async fn single_mode_fetches_exactly_one_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/only"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let crawler = make_crawler();
        let mut options = CrawlOptions::default();
        options.strategy = CrawlStrategyKind::Single;
        options.respect_robots_txt = false;

        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let cancel = CancellationToken::new();
        crawler
            .crawl(&format!("{}/only", server.uri()), &options, tx, cancel)
            .await
            .unwrap();

        let result = rx.recv().await.unwrap();
        assert!(result.is_success);
        assert!(rx.recv().await.is_none());
    }
}
