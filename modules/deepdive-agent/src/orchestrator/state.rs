use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Per-run state shared by the URL tasks of one research run.
pub struct ResearchState {
    pub research_id: String,
    pub initial_query: String,
    visited: Mutex<VisitedUrls>,
    fact_iterations: Mutex<HashMap<String, u32>>,
}

#[derive(Default)]
struct VisitedUrls {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl ResearchState {
    pub fn new(research_id: impl Into<String>, initial_query: impl Into<String>) -> Self {
        Self {
            research_id: research_id.into(),
            initial_query: initial_query.into(),
            visited: Mutex::new(VisitedUrls::default()),
            fact_iterations: Mutex::new(HashMap::new()),
        }
    }

    /// Mark `url` visited. Returns false if it already was, in which case the
    /// caller must not process it.
    pub fn claim_url(&self, url: &str) -> bool {
        let mut visited = self.visited.lock().expect("visited lock poisoned");
        if !visited.seen.insert(url.to_string()) {
            return false;
        }
        visited.order.push(url.to_string());
        true
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited
            .lock()
            .expect("visited lock poisoned")
            .seen
            .contains(url)
    }

    /// Visited URLs in claim order.
    pub fn visited_urls(&self) -> Vec<String> {
        self.visited
            .lock()
            .expect("visited lock poisoned")
            .order
            .clone()
    }

    /// Remember the iteration in which a fact was accepted.
    pub fn record_fact(&self, content: &str, iteration: u32) {
        self.fact_iterations
            .lock()
            .expect("fact iterations lock poisoned")
            .entry(content.to_string())
            .or_insert(iteration);
    }

    pub fn fact_iteration(&self, content: &str) -> Option<u32> {
        self.fact_iterations
            .lock()
            .expect("fact iterations lock poisoned")
            .get(content)
            .copied()
    }
}
