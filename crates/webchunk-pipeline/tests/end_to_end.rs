use std::time::Duration;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webchunk_chunking::ChunkingServices;
use webchunk_common::config::PipelineConfig;
use webchunk_common::types::{ChunkingOptions, CrawlOptions};
use webchunk_pipeline::PipelineOrchestrator;

fn make_orchestrator() -> PipelineOrchestrator {
    let config = PipelineConfig::default();
    PipelineOrchestrator::new(&config, None, ChunkingServices::default()).unwrap()
}

#[tokio::test]
async fn process_html_produces_chunks_in_index_order() {
    let orchestrator = make_orchestrator();
    let html = r#"<html><body>
        <h1>Title</h1>
        <p>First paragraph with enough content to be meaningful.</p>
        <p>Second paragraph continues the discussion further.</p>
    </body></html>"#;

    let chunk_options = ChunkingOptions { max_chunk_size: 80, overlap_size: 10, ..Default::default() };
    let chunks = orchestrator
        .process_html(html, "https://example.com/doc", &chunk_options, None)
        .await
        .unwrap();

    assert!(!chunks.is_empty());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.source_url, "https://example.com/doc");
    }
}

#[tokio::test]
async fn extract_content_stops_before_chunking() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><h1>Hi</h1><p>Body text.</p></body></html>"))
        .mount(&server)
        .await;

    let orchestrator = make_orchestrator();
    let mut crawl_options = CrawlOptions::default();
    crawl_options.respect_robots_txt = false;

    let content = orchestrator.extract_content(&server.uri(), &crawl_options).await.unwrap();
    assert!(content.main_text.contains("Body text"));
}

#[tokio::test]
async fn process_website_streams_chunks_from_crawled_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/robots.txt")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><h1>Home</h1><p>Welcome to the homepage with some content.</p></body></html>",
        ))
        .mount(&server)
        .await;

    let orchestrator = std::sync::Arc::new(make_orchestrator());
    let mut crawl_options = CrawlOptions::default();
    crawl_options.respect_robots_txt = false;
    crawl_options.strategy = webchunk_common::types::CrawlStrategyKind::Single;
    crawl_options.max_pages = 1;

    let chunk_options = ChunkingOptions::default();
    let cancel = CancellationToken::new();
    let mut stream = orchestrator.process_website(server.uri(), crawl_options, chunk_options, None, cancel);

    let mut collected = Vec::new();
    while let Some(chunk) = tokio::time::timeout(Duration::from_secs(5), stream.next()).await.unwrap_or(None) {
        collected.push(chunk);
    }

    assert!(!collected.is_empty());
}
