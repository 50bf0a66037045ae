//! Cross-source support scores for the facts in a knowledge store.

use std::collections::HashMap;
use std::sync::Arc;

use deepdive_common::{EvidenceFact, EvidenceMatrix, EvidenceSource};

use crate::graph::host_label;
use crate::knowledge::{cosine_similarity, Fact};

/// Build the source × fact support matrix.
///
/// `scores[s][f]` is how strongly source `s` corroborates fact `f`: the best
/// cosine similarity between `f` and any fact from `s`, mapped from [-1, 1]
/// to [0, 1]. A source never scores its own facts.
pub fn evidence_matrix(facts: &[Arc<Fact>]) -> EvidenceMatrix {
    let mut source_order: Vec<&str> = Vec::new();
    let mut by_source: HashMap<&str, Vec<&Fact>> = HashMap::new();
    for fact in facts {
        let url = fact.source_url.as_str();
        by_source
            .entry(url)
            .or_insert_with(|| {
                source_order.push(url);
                Vec::new()
            })
            .push(fact);
    }

    let sources = source_order
        .iter()
        .map(|url| EvidenceSource {
            id: url.to_string(),
            label: host_label(url),
        })
        .collect();

    let fact_items = facts
        .iter()
        .enumerate()
        .map(|(idx, f)| EvidenceFact {
            id: format!("f-{idx}"),
            label: f.content.clone(),
            source_id: f.source_url.clone(),
        })
        .collect();

    let scores = source_order
        .iter()
        .map(|source| {
            let source_facts = by_source.get(source).map(Vec::as_slice).unwrap_or(&[]);
            facts
                .iter()
                .map(|f| support_score(f, source, source_facts))
                .collect()
        })
        .collect();

    EvidenceMatrix {
        sources,
        facts: fact_items,
        scores,
    }
}

fn support_score(fact: &Fact, source: &str, source_facts: &[&Fact]) -> f64 {
    if fact.source_url == source || source_facts.is_empty() {
        return 0.0;
    }
    let max_sim = source_facts
        .iter()
        .map(|other| cosine_similarity(&fact.embedding, &other.embedding).clamp(-1.0, 1.0))
        .fold(f64::NEG_INFINITY, f64::max);
    ((max_sim + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(content: &str, source: &str, embedding: Vec<f64>) -> Arc<Fact> {
        Arc::new(Fact {
            content: content.to_string(),
            source_url: source.to_string(),
            embedding,
        })
    }

    #[test]
    fn empty_store_gives_empty_matrix() {
        let matrix = evidence_matrix(&[]);
        assert!(matrix.sources.is_empty());
        assert!(matrix.facts.is_empty());
        assert!(matrix.scores.is_empty());
    }

    #[test]
    fn scores_cross_source_support() {
        let facts = vec![
            fact("a1", "https://www.a.com/x", vec![1.0, 0.0]),
            fact("b1", "https://b.com/y", vec![1.0, 0.0]),
            fact("b2", "https://b.com/y", vec![-1.0, 0.0]),
        ];
        let matrix = evidence_matrix(&facts);

        assert_eq!(matrix.sources.len(), 2);
        assert_eq!(matrix.sources[0].label, "a.com");
        assert_eq!(matrix.facts[2].id, "f-2");
        assert_eq!(matrix.facts[2].source_id, "https://b.com/y");

        // row a.com: own fact scores 0, b1 identical, b2 opposite
        assert_eq!(matrix.scores[0], vec![0.0, 1.0, 0.0]);
        // row b.com: a1 best-matches b1
        assert_eq!(matrix.scores[1], vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn orthogonal_support_is_half() {
        let facts = vec![
            fact("a1", "https://a.com", vec![1.0, 0.0]),
            fact("b1", "https://b.com", vec![0.0, 1.0]),
        ];
        let matrix = evidence_matrix(&facts);
        assert!((matrix.scores[0][1] - 0.5).abs() < 1e-9);
        assert!((matrix.scores[1][0] - 0.5).abs() < 1e-9);
    }
}
