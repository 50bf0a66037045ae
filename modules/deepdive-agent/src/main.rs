use std::path::PathBuf;
use std::sync::Arc;

use ai_client::OpenAi;
use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deepdive_agent::embedder::Embedder;
use deepdive_agent::scraper::HttpScraper;
use deepdive_agent::search::BraveSearcher;
use deepdive_agent::{KnowledgeStore, ResearchOrchestrator, ResearchService};
use deepdive_common::Config;

#[derive(Parser)]
#[command(name = "deepdive", about = "Iterative web research with a final report")]
struct Cli {
    /// Research question
    query: String,

    /// Path to a TOML file with an [agent] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("deepdive=info".parse()?);
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    config.log_redacted();

    let mut openai = OpenAi::new(&config.api.openai_api_key, &config.api.openai_model)
        .with_embedding_model(&config.api.openai_embedding_model);
    if let Some(base_url) = &config.api.openai_base_url {
        openai = openai.with_base_url(base_url);
    }

    let store = Arc::new(KnowledgeStore::new(
        Arc::new(Embedder::new(openai.clone())),
        config.agent.similarity_threshold,
    ));
    let orchestrator = ResearchOrchestrator::new(
        Arc::new(BraveSearcher::new(&config.api.brave_api_key)?),
        Arc::new(HttpScraper::new()?),
        Arc::new(openai),
        store,
        config.agent.clone(),
    );
    let service = ResearchService::new(Arc::new(orchestrator));

    let research_id = service.start(&cli.query)?;
    info!(research_id = research_id.as_str(), "Research job started");

    let mut rx = service.subscribe(&research_id)?;
    let last = loop {
        let update = rx.borrow_and_update().clone();
        if update.is_complete {
            break update;
        }
        eprintln!("{}", update.message);
        if rx.changed().await.is_err() {
            bail!("Progress channel closed before the research finished");
        }
    };

    if last.is_error() {
        bail!("{}", last.message);
    }
    eprintln!("{}", last.message);
    println!("{}", last.final_report.unwrap_or_default());
    Ok(())
}
