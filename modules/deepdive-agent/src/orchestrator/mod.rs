//! The research loop.
//!
//! One run: search the current query, pick a host-diverse batch of unseen
//! URLs, fetch and extract them concurrently into the shared knowledge store,
//! then ask the planner for the next query. After the last iteration (or an
//! early stop) the report is written from the original query and every
//! stored fact. Each step is published as a full snapshot to the run's sink.
//!
//! The knowledge store is shared by every run of this orchestrator and each
//! run clears it on start, so concurrent runs see each other's facts.

mod selection;
mod state;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ai_client::ChatAgent;
use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use deepdive_common::{AgentConfig, ProgressUpdate};

use crate::graph::build_graph;
use crate::knowledge::KnowledgeStore;
use crate::progress::ProgressSink;
use crate::retry::RetryPolicy;
use crate::synthesis::{FactExtractor, QueryPlanner, ReportGenerator};
use crate::traits::{is_search_error, ContentFetcher, WebSearcher};

pub use selection::{extract_urls, host, pick_diverse};
pub use state::ResearchState;

pub struct ResearchOrchestrator {
    searcher: Arc<dyn WebSearcher>,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<FactExtractor>,
    planner: QueryPlanner,
    reporter: ReportGenerator,
    store: Arc<KnowledgeStore>,
    config: AgentConfig,
    fetch_retry: RetryPolicy,
}

impl ResearchOrchestrator {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        fetcher: Arc<dyn ContentFetcher>,
        llm: Arc<dyn ChatAgent>,
        store: Arc<KnowledgeStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            extractor: Arc::new(FactExtractor::new(llm.clone())),
            planner: QueryPlanner::new(llm.clone()),
            reporter: ReportGenerator::new(llm),
            store,
            config,
            fetch_retry: RetryPolicy::attempts(2),
        }
    }

    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Run one research job to a terminal event. Never fails: any error is
    /// published as a completed `Error: ...` update.
    pub async fn conduct_research(
        &self,
        research_id: &str,
        query: &str,
        sink: Arc<dyn ProgressSink>,
    ) {
        let ctx = RunContext {
            state: Arc::new(ResearchState::new(research_id, query)),
            store: self.store.clone(),
            sink,
        };
        self.store.clear();
        info!(research_id, query, "Research started");

        match AssertUnwindSafe(self.run_inner(&ctx)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(research_id, error = %e, "Research failed");
                ctx.complete(format!("Error: {e:#}"), None);
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                error!(research_id, error = %cause, "Research panicked");
                ctx.complete(format!("Error: research run panicked: {cause}"), None);
            }
        }
    }

    async fn run_inner(&self, ctx: &RunContext) -> Result<()> {
        let max_iterations = self.config.max_iterations;
        let concurrency = self.config.scrape_concurrency.max(1);
        let batch_size = (concurrency * 2).max(2);
        let original_query = ctx.state.initial_query.clone();
        let mut current_query = original_query.clone();

        for iteration in 1..=max_iterations {
            ctx.update(format!(
                "Iteration {iteration}: Searching for '{current_query}'"
            ));
            let results = self.searcher.search(&current_query).await;
            if is_search_error(&results) {
                ctx.update(results);
                break;
            }

            let pending: Vec<String> = extract_urls(&results)
                .into_iter()
                .filter(|url| !ctx.state.is_visited(url))
                .collect();
            if pending.is_empty() {
                ctx.update("No new URLs found.");
                break;
            }

            let selected = pick_diverse(&pending, batch_size);
            let new_facts = self
                .process_urls(ctx, &selected, &current_query, iteration, concurrency)
                .await?;

            ctx.update(format!(
                "Found {new_facts} new facts. Total facts: {}. Sources with facts: {}.",
                self.store.get_fact_count(),
                self.store.distinct_source_count()
            ));

            if iteration < max_iterations {
                ctx.update("Reflecting on findings to plan next step...");
                current_query = self
                    .planner
                    .next_query(&original_query, &self.store.get_all_facts())
                    .await;
            }
        }

        ctx.update("Synthesizing final report...");
        let report = self
            .reporter
            .final_report(&original_query, &self.store.get_all_facts())
            .await;
        ctx.complete("Research complete.", Some(report));
        info!(
            research_id = ctx.state.research_id.as_str(),
            facts = self.store.get_fact_count(),
            sources = ctx.state.visited_urls().len(),
            "Research complete"
        );
        Ok(())
    }

    /// Fetch and extract up to `limit` of `urls` concurrently. Returns the
    /// number of facts newly stored.
    async fn process_urls(
        &self,
        ctx: &RunContext,
        urls: &[String],
        query: &str,
        iteration: u32,
        limit: usize,
    ) -> Result<usize> {
        let mut tasks = JoinSet::new();
        for url in urls.iter().take(limit) {
            let task = UrlTask {
                url: url.clone(),
                query: query.to_string(),
                iteration,
                ctx: ctx.clone(),
                fetcher: self.fetcher.clone(),
                extractor: self.extractor.clone(),
                retry: self.fetch_retry,
            };
            tasks.spawn(task.run());
        }

        let mut new_facts = 0;
        while let Some(joined) = tasks.join_next().await {
            new_facts += joined.context("URL task failed")?;
        }
        Ok(new_facts)
    }
}

// --- Per-run plumbing ---

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Clone)]
struct RunContext {
    state: Arc<ResearchState>,
    store: Arc<KnowledgeStore>,
    sink: Arc<dyn ProgressSink>,
}

impl RunContext {
    fn update(&self, message: impl Into<String>) {
        self.emit(message.into(), false, None);
    }

    fn complete(&self, message: impl Into<String>, final_report: Option<String>) {
        self.emit(message.into(), true, final_report);
    }

    fn emit(&self, message: String, is_complete: bool, final_report: Option<String>) {
        info!(
            research_id = self.state.research_id.as_str(),
            is_complete, "{message}"
        );
        let graph = build_graph(&self.state, &self.store.get_all_facts());
        self.sink.publish(ProgressUpdate {
            research_id: self.state.research_id.clone(),
            message,
            is_complete,
            final_report,
            knowledge_graph: graph,
        });
    }
}

struct UrlTask {
    url: String,
    query: String,
    iteration: u32,
    ctx: RunContext,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<FactExtractor>,
    retry: RetryPolicy,
}

impl UrlTask {
    async fn run(self) -> usize {
        let url = self.url.as_str();
        if !self.ctx.state.claim_url(url) {
            return 0;
        }

        self.ctx.update(format!("Scraping {url}"));
        let fetcher = &self.fetcher;
        let content = match self.retry.run("fetch", || fetcher.fetch(url)).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url, error = %e, "Fetch failed, skipping URL");
                String::new()
            }
        };
        if content.trim().is_empty() {
            return 0;
        }

        self.ctx.update(format!("Analyzing content from {url}"));
        let facts = self.extractor.extract_facts(&content, &self.query).await;

        let mut added = 0;
        for fact in facts {
            if self.ctx.store.add_fact(&fact, url).await {
                self.ctx.state.record_fact(&fact, self.iteration);
                added += 1;
                self.ctx.update("New fact discovered.");
            }
        }
        added
    }
}
