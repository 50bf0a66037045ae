//! Deduplicating fact store shared by concurrent URL tasks.
//!
//! Exact duplicates are rejected by content before any embedding call.
//! Semantic duplicates are rejected by a linear cosine scan against the facts
//! present when the candidate is checked. Two near-duplicates checked
//! concurrently may both be admitted; verbatim duplicates never are.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::embedder::TextEmbedder;
use crate::knowledge::cosine_similarity;

/// A source-attributed claim and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub content: String,
    pub source_url: String,
    pub embedding: Vec<f64>,
}

pub struct KnowledgeStore {
    embedder: Arc<dyn TextEmbedder>,
    similarity_threshold: f64,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    facts: Vec<Arc<Fact>>,
    contents: HashSet<String>,
}

impl KnowledgeStore {
    pub fn new(embedder: Arc<dyn TextEmbedder>, similarity_threshold: f64) -> Self {
        Self {
            embedder,
            similarity_threshold,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Store `content` unless it is a verbatim or semantic duplicate, or its
    /// embedding is unavailable. Returns true iff the fact was newly stored.
    pub async fn add_fact(&self, content: &str, source_url: &str) -> bool {
        if self.contains(content) {
            debug!(source_url, "Exact duplicate fact rejected");
            return false;
        }

        let embedding = match self.embedder.embed(content).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => {
                warn!(source_url, "Empty embedding, fact dropped");
                return false;
            }
            Err(e) => {
                warn!(source_url, error = %e, "Embedding failed, fact dropped");
                return false;
            }
        };

        if let Some(similarity) = self.find_redundant(&embedding) {
            debug!(source_url, similarity, "Near-duplicate fact rejected");
            return false;
        }

        let mut inner = self.inner.write().expect("knowledge store lock poisoned");
        // Another task may have stored the same text while we were embedding.
        if !inner.contents.insert(content.to_string()) {
            return false;
        }
        inner.facts.push(Arc::new(Fact {
            content: content.to_string(),
            source_url: source_url.to_string(),
            embedding,
        }));
        true
    }

    /// Highest similarity above the threshold against any stored fact.
    fn find_redundant(&self, embedding: &[f64]) -> Option<f64> {
        let inner = self.inner.read().expect("knowledge store lock poisoned");
        inner
            .facts
            .iter()
            .map(|f| cosine_similarity(embedding, &f.embedding))
            .filter(|sim| *sim > self.similarity_threshold)
            .fold(None, |best: Option<f64>, sim| {
                Some(best.map_or(sim, |b| b.max(sim)))
            })
    }

    pub fn contains(&self, content: &str) -> bool {
        self.inner
            .read()
            .expect("knowledge store lock poisoned")
            .contents
            .contains(content)
    }

    /// All stored facts in insertion order.
    pub fn get_all_facts(&self) -> Vec<Arc<Fact>> {
        self.inner
            .read()
            .expect("knowledge store lock poisoned")
            .facts
            .clone()
    }

    pub fn get_fact_count(&self) -> usize {
        self.inner
            .read()
            .expect("knowledge store lock poisoned")
            .facts
            .len()
    }

    /// Number of distinct source URLs that contributed at least one fact.
    pub fn distinct_source_count(&self) -> usize {
        let inner = self.inner.read().expect("knowledge store lock poisoned");
        inner
            .facts
            .iter()
            .map(|f| f.source_url.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("knowledge store lock poisoned");
        inner.facts.clear();
        inner.contents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedEmbedder;

    fn store_with(embedder: FixedEmbedder, threshold: f64) -> KnowledgeStore {
        KnowledgeStore::new(Arc::new(embedder), threshold)
    }

    #[tokio::test]
    async fn exact_duplicate_rejected_regardless_of_source() {
        let embedder = Arc::new(FixedEmbedder::new());
        let store = KnowledgeStore::new(embedder.clone(), 0.9);

        assert!(store.add_fact("Rust 1.0 shipped in 2015.", "https://a.com").await);
        assert!(!store.add_fact("Rust 1.0 shipped in 2015.", "https://b.com").await);

        assert_eq!(store.get_fact_count(), 1);
        assert_eq!(store.get_all_facts()[0].source_url, "https://a.com");
        // second attempt never reached the embedder
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn near_duplicate_above_threshold_rejected() {
        let embedder = FixedEmbedder::new()
            .with_vector("fact one", vec![1.0, 0.0, 0.0])
            .with_vector("fact one again", vec![0.99, 0.1, 0.0])
            .with_vector("unrelated", vec![0.0, 1.0, 0.0]);
        let store = store_with(embedder, 0.9);

        assert!(store.add_fact("fact one", "https://a.com").await);
        assert!(!store.add_fact("fact one again", "https://b.com").await);
        assert!(store.add_fact("unrelated", "https://b.com").await);
        assert_eq!(store.get_fact_count(), 2);
    }

    #[tokio::test]
    async fn similarity_equal_to_threshold_is_admitted() {
        let embedder = FixedEmbedder::new()
            .with_vector("a", vec![1.0, 0.0])
            .with_vector("b", vec![1.0, 0.0]);
        let store = store_with(embedder, 1.0);

        assert!(store.add_fact("a", "https://x.com").await);
        assert!(store.add_fact("b", "https://x.com").await);
    }

    #[tokio::test]
    async fn embedding_failure_drops_fact() {
        let embedder = FixedEmbedder::new().failing_on("cannot embed");
        let store = store_with(embedder, 0.9);

        assert!(!store.add_fact("cannot embed", "https://a.com").await);
        assert_eq!(store.get_fact_count(), 0);
        assert!(!store.contains("cannot embed"));
    }

    #[tokio::test]
    async fn empty_embedding_drops_fact() {
        let embedder = FixedEmbedder::new().with_vector("hollow", vec![]);
        let store = store_with(embedder, 0.9);
        assert!(!store.add_fact("hollow", "https://a.com").await);
    }

    #[tokio::test]
    async fn facts_keep_insertion_order_and_count_sources() {
        let store = store_with(FixedEmbedder::new(), 0.99);
        store.add_fact("alpha bravo charlie", "https://a.com/1").await;
        store.add_fact("delta echo foxtrot", "https://b.com/1").await;
        store.add_fact("golf hotel india", "https://a.com/1").await;

        let contents: Vec<_> = store
            .get_all_facts()
            .iter()
            .map(|f| f.content.clone())
            .collect();
        assert_eq!(
            contents,
            vec!["alpha bravo charlie", "delta echo foxtrot", "golf hotel india"]
        );
        assert_eq!(store.distinct_source_count(), 2);
    }

    #[tokio::test]
    async fn clear_empties_store() {
        let store = store_with(FixedEmbedder::new(), 0.9);
        store.add_fact("something true", "https://a.com").await;
        store.clear();
        assert_eq!(store.get_fact_count(), 0);
        assert!(store.add_fact("something true", "https://a.com").await);
    }

    #[tokio::test]
    async fn concurrent_identical_adds_store_once() {
        let store = Arc::new(store_with(FixedEmbedder::new(), 0.9));
        let mut set = tokio::task::JoinSet::new();
        for i in 0..8 {
            let store = store.clone();
            set.spawn(async move {
                store
                    .add_fact("the same claim", &format!("https://s{i}.com"))
                    .await
            });
        }
        let mut accepted = 0;
        while let Some(res) = set.join_next().await {
            if res.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.get_fact_count(), 1);
    }
}
