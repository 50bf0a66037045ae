// Test mocks for the research loop.
//
// One mock per trait boundary:
// - MockSearcher (WebSearcher): query -> canned result text, with a default
// - MockFetcher (ContentFetcher): URL -> page text, scripted failures, fetch counts
// - FixedEmbedder (TextEmbedder): deterministic hash-based vectors
// - ScriptedLlm (ChatAgent): canned responses keyed by prompt fragments
// - RecordingSink (ProgressSink): keeps every published update
//
// Plus `search_results` for building provider text from a list of URLs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_client::{ChatAgent, Message, MessageRole};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use deepdive_common::ProgressUpdate;

use crate::embedder::TextEmbedder;
use crate::progress::ProgressSink;
use crate::search::{format_results, SearchResult};
use crate::traits::{ContentFetcher, WebSearcher};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Standard embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 64;

/// Format `urls` the way a search provider would.
pub fn search_results(urls: &[&str]) -> String {
    let results: Vec<SearchResult> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| SearchResult {
            url: url.to_string(),
            title: format!("Result {}", i + 1),
            snippet: format!("Snippet for {url}"),
        })
        .collect();
    format_results(&results)
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Canned search provider. Unregistered queries get the default text.
pub struct MockSearcher {
    default: String,
    responses: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            responses: HashMap::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, results: impl Into<String>) -> Self {
        self.responses.insert(query.to_string(), results.into());
        self
    }

    /// Queries issued so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str) -> String {
        self.queries.lock().unwrap().push(query.to_string());
        self.responses
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Returns `Err` for unregistered URLs.
/// Builder pattern: `.on_page()`, `.flaky_page()`, `.panic_on()`.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    panics: Vec<String>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            panics: Vec::new(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_page(mut self, url: &str, content: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), content.into());
        self
    }

    /// Fail the first `failures` fetches of `url`, then serve `content`.
    pub fn flaky_page(mut self, url: &str, failures: usize, content: impl Into<String>) -> Self {
        self.failures
            .get_mut()
            .unwrap()
            .insert(url.to_string(), failures);
        self.on_page(url, content)
    }

    /// Panic inside the fetch of `url`.
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panics.push(url.to_string());
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;

        if self.panics.iter().any(|u| u == url) {
            panic!("MockFetcher: scripted panic for {url}");
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("MockFetcher: scripted failure for {url}");
                }
            }
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockFetcher: no page registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder for testing. Registered texts get exact vectors;
/// unmatched texts get a unique hash-based vector (low similarity to everything).
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f64>>,
    failing: Vec<String>,
    dimension: usize,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            failing: Vec::new(),
            dimension: TEST_EMBEDDING_DIM,
            calls: AtomicUsize::new(0),
        }
    }

    /// Register a text→vector mapping for controlled similarity.
    pub fn with_vector(mut self, text: &str, vector: Vec<f64>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Make embedding `text` fail.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generate a deterministic hash-based vector for unmatched text.
    fn hash_vector(&self, text: &str) -> Vec<f64> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f64; self.dimension];
        for v in vec.iter_mut() {
            // LCG
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f64 / u32::MAX as f64) * 2.0 - 1.0;
        }
        let norm: f64 = vec.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|t| t == text) {
            bail!("FixedEmbedder: scripted failure");
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text)))
    }
}

// ---------------------------------------------------------------------------
// ScriptedLlm
// ---------------------------------------------------------------------------

enum Reply {
    Text(String),
    Fail,
}

struct Rule {
    system_fragment: String,
    user_fragment: Option<String>,
    reply: Reply,
}

/// Chat model returning canned replies. The first rule whose system-prompt
/// fragment (and optional user-prompt fragment) matches wins; no match is an
/// error, which callers treat as "model unavailable".
pub struct ScriptedLlm {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_system(mut self, system_fragment: &str, reply: impl Into<String>) -> Self {
        self.rules.push(Rule {
            system_fragment: system_fragment.to_string(),
            user_fragment: None,
            reply: Reply::Text(reply.into()),
        });
        self
    }

    pub fn on_prompt(
        mut self,
        system_fragment: &str,
        user_fragment: &str,
        reply: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule {
            system_fragment: system_fragment.to_string(),
            user_fragment: Some(user_fragment.to_string()),
            reply: Reply::Text(reply.into()),
        });
        self
    }

    pub fn failing_on(mut self, system_fragment: &str) -> Self {
        self.rules.push(Rule {
            system_fragment: system_fragment.to_string(),
            user_fragment: None,
            reply: Reply::Fail,
        });
        self
    }

    /// User prompts of calls whose system prompt contains `system_fragment`.
    pub fn user_prompts(&self, system_fragment: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|msgs| prompt_of(msgs, MessageRole::System).contains(system_fragment))
            .map(|msgs| prompt_of(msgs, MessageRole::User))
            .collect()
    }
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_of(messages: &[Message], role: MessageRole) -> String {
    messages
        .iter()
        .filter(|m| m.role == role)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ChatAgent for ScriptedLlm {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let system = prompt_of(messages, MessageRole::System);
        let user = prompt_of(messages, MessageRole::User);

        let rule = self.rules.iter().find(|r| {
            system.contains(&r.system_fragment)
                && r.user_fragment.as_ref().is_none_or(|f| user.contains(f))
        });
        match rule.map(|r| &r.reply) {
            Some(Reply::Text(text)) => Ok(text.clone()),
            Some(Reply::Fail) => bail!("ScriptedLlm: scripted failure"),
            None => bail!("ScriptedLlm: no reply scripted"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Progress sink that keeps every update, for asserting on exact sequences.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.message.clone())
            .collect()
    }

    pub fn last(&self) -> Option<ProgressUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
