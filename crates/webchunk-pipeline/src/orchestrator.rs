//! C11: Pipeline Orchestrator (spec §4.11). Wires the crawler, extractor,
//! optional AI enhancer, and chunker into the bounded-channel worker-pool
//! topology and exposes the public façade operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use webchunk_ai::AiEnhancementService;
use webchunk_chunking::ChunkingServices;
use webchunk_common::config::PipelineConfig;
use webchunk_common::error::{CommonError, PipelineErrorKind};
use webchunk_common::types::{ChunkingOptions, CrawlOptions, CrawlResult, EnhancedContent, ExtractedContent, ProcessingProgress, WebContentChunk};
use webchunk_crawler::Crawler;
use webchunk_net::rate_limiter::DomainRateLimiter;
use webchunk_net::resilience::ResiliencePolicy;
use webchunk_net::HttpFetcher;

use crate::events::{EventBus, ProcessingEvent, SharedEventBus};

const CRAWL_CHANNEL_CAPACITY: usize = 100;
const EXTRACT_CHANNEL_CAPACITY: usize = 50;
const ENHANCE_CHANNEL_CAPACITY: usize = 25;
const PROGRESS_EVERY_CHUNKS: usize = 50;
const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(100);
const MEMORY_PRESSURE_THRESHOLD: f32 = 0.8;

pub struct PipelineOrchestrator {
    crawler: Arc<Crawler>,
    enhancement: Option<Arc<AiEnhancementService>>,
    chunking_services: ChunkingServices,
    memory_ceiling_bytes: u64,
    events: SharedEventBus,
}

impl PipelineOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        enhancement: Option<Arc<AiEnhancementService>>,
        chunking_services: ChunkingServices,
    ) -> Result<Self, CommonError> {
        let fetcher = Arc::new(HttpFetcher::new(
            &config.crawl.user_agent,
            Duration::from_secs(config.crawl.timeout_seconds),
        )?);
        let rate_limiter = Arc::new(DomainRateLimiter::new(config.crawl.delay_ms));
        let resilience = Arc::new(ResiliencePolicy::new(
            config.resilience.circuit_breaker_failure_threshold,
            Duration::from_secs(config.resilience.circuit_breaker_half_open_after_secs),
            config.resilience.fetch_bulkhead_capacity,
            config.resilience.retry_max_attempts,
            Duration::from_secs(config.crawl.timeout_seconds),
        ));
        let crawler = Arc::new(Crawler::new(fetcher, rate_limiter, resilience));

        Ok(Self {
            crawler,
            enhancement,
            chunking_services,
            memory_ceiling_bytes: config.memory.ceiling_bytes,
            events: Arc::new(EventBus::new()),
        })
    }

    pub fn events(&self) -> SharedEventBus {
        self.events.clone()
    }

    /// `ExtractContentAsync` — fetches one URL and stops before chunking.
    #[instrument(skip(self, crawl_options))]
    pub async fn extract_content(
        &self,
        url: &str,
        crawl_options: &CrawlOptions,
    ) -> Result<ExtractedContent, PipelineErrorKind> {
        let result = self.crawl_single(url, crawl_options).await?;
        Ok(extract_from_result(&result))
    }

    /// `ProcessUrlAsync` — single-URL convenience running every stage
    /// synchronously in-process.
    #[instrument(skip(self, crawl_options, chunk_options, enhance_options))]
    pub async fn process_url(
        &self,
        url: &str,
        crawl_options: &CrawlOptions,
        chunk_options: &ChunkingOptions,
        enhance_options: Option<&webchunk_ai::EnhancementOptions>,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        let result = self.crawl_single(url, crawl_options).await?;
        let extracted = extract_from_result(&result);
        let final_content = self.maybe_enhance(extracted, enhance_options).await?;
        webchunk_chunking::chunk(&final_content, chunk_options, &self.chunking_services).await
    }

    /// `ProcessUrlsBatchAsync`.
    pub async fn process_urls_batch(
        &self,
        urls: &[String],
        crawl_options: &CrawlOptions,
        chunk_options: &ChunkingOptions,
        enhance_options: Option<&webchunk_ai::EnhancementOptions>,
    ) -> HashMap<String, Vec<WebContentChunk>> {
        let mut out = HashMap::new();
        for url in urls {
            match self.process_url(url, crawl_options, chunk_options, enhance_options).await {
                Ok(chunks) => {
                    out.insert(url.clone(), chunks);
                }
                Err(err) => {
                    self.events.publish(ProcessingEvent::ProcessingError {
                        job_id: "batch".to_string(),
                        source_url: Some(url.clone()),
                        message: err.to_string(),
                    });
                    out.insert(url.clone(), Vec::new());
                }
            }
        }
        out
    }

    /// `ProcessHtmlAsync` — skips the crawl stage entirely.
    #[instrument(skip(self, html, chunk_options, enhance_options))]
    pub async fn process_html(
        &self,
        html: &str,
        source_url: &str,
        chunk_options: &ChunkingOptions,
        enhance_options: Option<&webchunk_ai::EnhancementOptions>,
    ) -> Result<Vec<WebContentChunk>, PipelineErrorKind> {
        let extracted = webchunk_extractor::extract(html, source_url, None);
        let final_content = self.maybe_enhance(extracted, enhance_options).await?;
        webchunk_chunking::chunk(&final_content, chunk_options, &self.chunking_services).await
    }

    /// `ProcessWebsiteAsync` — the full bounded-channel worker-pool
    /// topology (spec §4.11 diagram). Returns a chunk stream; cancelling
    /// `cancel` drains all stages and closes the stream.
    pub fn process_website(
        self: &Arc<Self>,
        start_url: String,
        crawl_options: CrawlOptions,
        chunk_options: ChunkingOptions,
        enhance_options: Option<webchunk_ai::EnhancementOptions>,
        cancel: CancellationToken,
    ) -> ReceiverStream<WebContentChunk> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let orchestrator = self.clone();
        let concurrency = crawl_options.max_concurrent_requests.max(1);

        let (crawl_tx, crawl_rx) = mpsc::channel::<CrawlResult>(CRAWL_CHANNEL_CAPACITY);
        let (extract_tx, extract_rx) = mpsc::channel::<ExtractedContent>(EXTRACT_CHANNEL_CAPACITY);
        let (enhance_tx, enhance_rx) = mpsc::channel::<ExtractedContent>(ENHANCE_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel::<WebContentChunk>(ENHANCE_CHANNEL_CAPACITY);

        orchestrator.events.publish(ProcessingEvent::CrawlStarted { job_id: job_id.clone(), start_url: start_url.clone() });

        // Crawler stage.
        {
            let crawler = orchestrator.crawler.clone();
            let cancel = cancel.clone();
            let crawl_options = crawl_options.clone();
            let job_id = job_id.clone();
            let events = orchestrator.events.clone();
            tokio::spawn(async move {
                if let Err(err) = crawler.crawl(&start_url, &crawl_options, crawl_tx, cancel).await {
                    events.publish(ProcessingEvent::ProcessingError {
                        job_id,
                        source_url: Some(start_url.clone()),
                        message: err.to_string(),
                    });
                }
            });
        }

        // Extractor worker pool (N = maxConcurrentRequests * 2).
        {
            let input = Arc::new(Mutex::new(crawl_rx));
            let events = orchestrator.events.clone();
            let job_id = job_id.clone();
            let memory_ceiling = orchestrator.memory_ceiling_bytes;
            for _ in 0..(concurrency * 2) {
                let input = input.clone();
                let tx = extract_tx.clone();
                let cancel = cancel.clone();
                let events = events.clone();
                let job_id = job_id.clone();
                tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        maybe_backpressure_sleep(memory_ceiling).await;
                        let next = { input.lock().await.recv().await };
                        let Some(result) = next else { break };
                        events.publish(ProcessingEvent::PageFetched { job_id: job_id.clone(), result: Box::new(result.clone()) });
                        if !result.is_success {
                            continue;
                        }
                        let content = extract_from_result(&result);
                        events.publish(ProcessingEvent::ExtractionCompleted {
                            job_id: job_id.clone(),
                            content: Box::new(content.clone()),
                        });
                        if tx.send(content).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
        drop(extract_tx);

        // Enhancer worker pool (optional, N = maxConcurrentRequests).
        {
            let input = Arc::new(Mutex::new(extract_rx));
            let enhancement = orchestrator.enhancement.clone();
            let enhance_options = enhance_options.clone();
            for _ in 0..concurrency {
                let input = input.clone();
                let tx = enhance_tx.clone();
                let cancel = cancel.clone();
                let enhancement = enhancement.clone();
                let enhance_options = enhance_options.clone();
                tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let next = { input.lock().await.recv().await };
                        let Some(content) = next else { break };
                        let final_content = if let (Some(service), Some(opts)) = (&enhancement, &enhance_options) {
                            match service.enhance(content, opts).await {
                                Ok(enhanced) => merge_enhanced(enhanced),
                                Err(_) => continue,
                            }
                        } else {
                            content
                        };
                        if tx.send(final_content).await.is_err() {
                            break;
                        }
                    }
                });
            }
        }
        drop(enhance_tx);

        // Chunker worker pool (N = CPU count).
        {
            let input = Arc::new(Mutex::new(enhance_rx));
            let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
            let chunk_options = chunk_options.clone();
            let services = orchestrator.chunking_services.clone();
            let events = orchestrator.events.clone();
            let job_id = job_id.clone();
            let total_chunks = Arc::new(AtomicU64::new(0));
            let mut worker_handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let input = input.clone();
                let tx = output_tx.clone();
                let cancel = cancel.clone();
                let chunk_options = chunk_options.clone();
                let services = services.clone();
                let events = events.clone();
                let job_id = job_id.clone();
                let total_chunks = total_chunks.clone();
                let handle = tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let next = { input.lock().await.recv().await };
                        let Some(content) = next else { break };
                        let source_url = content.source_url.clone();
                        let chunks = match webchunk_chunking::chunk(&content, &chunk_options, &services).await {
                            Ok(chunks) => chunks,
                            Err(err) => {
                                warn!(error = %err, url = %source_url, "chunking failed, emitting synthetic error chunk");
                                vec![synthetic_error_chunk(&content, &err)]
                            }
                        };
                        events.publish(ProcessingEvent::ChunkingCompleted {
                            job_id: job_id.clone(),
                            source_url: source_url.clone(),
                            chunk_count: chunks.len(),
                        });
                        for chunk in chunks {
                            let count = total_chunks.fetch_add(1, Ordering::Relaxed) + 1;
                            if tx.send(chunk).await.is_err() {
                                return;
                            }
                            if count as usize % PROGRESS_EVERY_CHUNKS == 0 {
                                events.publish(ProcessingEvent::ProcessingProgress {
                                    job_id: job_id.clone(),
                                    progress: Box::new(progress_snapshot(&job_id, count as usize)),
                                });
                            }
                        }
                    }
                });
                worker_handles.push(handle);
            }
            drop(output_tx);

            let events = orchestrator.events.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                for handle in worker_handles {
                    let _ = handle.await;
                }
                events.publish(ProcessingEvent::ProcessingCompleted {
                    job_id: job_id.clone(),
                    total_chunks: total_chunks.load(Ordering::Relaxed) as usize,
                });
            });
        }

        ReceiverStream::new(output_rx)
    }

    async fn crawl_single(&self, url: &str, crawl_options: &CrawlOptions) -> Result<CrawlResult, PipelineErrorKind> {
        let single_options = CrawlOptions { strategy: webchunk_common::types::CrawlStrategyKind::Single, ..crawl_options.clone() };
        let (tx, mut rx) = mpsc::channel(1);
        self.crawler
            .crawl(url, &single_options, tx, CancellationToken::new())
            .await
            .map_err(|e| PipelineErrorKind::Internal(e.to_string()))?;
        rx.recv().await.ok_or(PipelineErrorKind::Internal("crawler produced no result".to_string())).and_then(|r| {
            if r.is_success {
                Ok(r)
            } else {
                Err(r.error_kind.unwrap_or(PipelineErrorKind::Internal("unknown crawl failure".to_string())))
            }
        })
    }

    async fn maybe_enhance(
        &self,
        content: ExtractedContent,
        enhance_options: Option<&webchunk_ai::EnhancementOptions>,
    ) -> Result<ExtractedContent, PipelineErrorKind> {
        let (Some(service), Some(options)) = (&self.enhancement, enhance_options) else {
            return Ok(content);
        };
        let enhanced = service.enhance(content, options).await?;
        Ok(merge_enhanced(enhanced))
    }
}

/// Folds `EnhancedContent`'s AI outputs back into the flowing
/// `ExtractedContent` under `ai_summary`/`ai_rewrite`/`ai_metadata` so the
/// chunker can surface them in `additionalMetadata` without knowing about
/// AI enhancement at all.
fn merge_enhanced(enhanced: EnhancedContent) -> ExtractedContent {
    let mut content = enhanced.original;
    if let Some(summary) = enhanced.summary {
        content.metadata.extra.insert("ai_summary".to_string(), summary);
    }
    if let Some(rewritten) = enhanced.rewritten {
        content.metadata.extra.insert("ai_rewrite".to_string(), rewritten);
    }
    if let Some(metadata) = enhanced.enriched_metadata {
        content.metadata.extra.insert("ai_metadata".to_string(), metadata.to_string());
    }
    content
}

fn extract_from_result(result: &CrawlResult) -> ExtractedContent {
    webchunk_extractor::extract(&result.content, &result.final_url, result.content_type.as_deref())
}

fn synthetic_error_chunk(content: &ExtractedContent, err: &PipelineErrorKind) -> WebContentChunk {
    let mut metadata = HashMap::new();
    metadata.insert("error".to_string(), json!(err.to_string()));
    WebContentChunk {
        chunk_id: uuid::Uuid::new_v4().to_string(),
        chunk_index: 0,
        content: String::new(),
        source_url: content.source_url.clone(),
        start_position: 0,
        end_position: 0,
        additional_metadata: metadata,
        content_type: content.content_type,
        strategy_used: webchunk_common::types::ChunkingStrategyKind::Auto,
    }
}

fn progress_snapshot(job_id: &str, generated_chunks: usize) -> ProcessingProgress {
    ProcessingProgress {
        job_id: job_id.to_string(),
        progress: 0.0,
        current_stage: "chunking".to_string(),
        processed_pages: 0,
        total_pages: None,
        generated_chunks,
        processing_rate: 0.0,
        estimated_completion: None,
        last_updated: Utc::now(),
        errors: Vec::new(),
    }
}

async fn maybe_backpressure_sleep(ceiling_bytes: u64) {
    if ceiling_bytes == 0 {
        return;
    }
    if let Some(used) = current_process_memory_bytes() {
        let pressure = used as f32 / ceiling_bytes as f32;
        if pressure > MEMORY_PRESSURE_THRESHOLD {
            info!(pressure, "memory pressure above threshold, backing off fetch workers");
            tokio::time::sleep(BACKPRESSURE_SLEEP).await;
        }
    }
}

/// Best-effort process working-set read; returns `None` on platforms
/// without `/proc/self/statm` rather than failing the pipeline.
fn current_process_memory_bytes() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = contents.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}
