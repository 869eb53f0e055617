use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use webchunk_chunking::ChunkingServices;
use webchunk_common::config::PipelineConfig;
use webchunk_common::types::{ChunkingOptions, CrawlOptions};
use webchunk_pipeline::PipelineOrchestrator;

#[derive(Parser)]
#[command(name = "webchunk")]
#[command(about = "Crawl a page and print the chunks it produces")]
struct Cli {
    /// URL to crawl and chunk
    url: String,

    /// Path to a PipelineConfig TOML file
    #[arg(short, long, default_value = "webchunk.toml")]
    config: String,

    /// Print chunks as a JSON array instead of one-per-line summaries
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    let config = if std::path::Path::new(&cli.config).exists() {
        PipelineConfig::load(&cli.config).context("failed to load pipeline config")?
    } else {
        PipelineConfig::default()
    };

    info!(url = %cli.url, "starting crawl");
    let orchestrator = PipelineOrchestrator::new(&config, None, ChunkingServices::default())
        .context("failed to build pipeline orchestrator")?;

    let chunks = orchestrator
        .process_url(&cli.url, &CrawlOptions::default(), &ChunkingOptions::default(), None)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    info!(count = chunks.len(), "chunking complete");
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        for chunk in &chunks {
            println!("[{}] {} bytes from {}", chunk.chunk_index, chunk.content.len(), chunk.source_url);
        }
    }

    Ok(())
}
