use std::sync::Arc;

use deepdive_common::{GraphEdge, GraphNode, KnowledgeGraph, NodeKind};

use crate::knowledge::Fact;
use crate::orchestrator::ResearchState;

/// Display label for a source: its host without a leading `www.`, or the raw
/// URL when it does not parse.
pub fn host_label(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h).to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Snapshot graph of sources and facts for a run.
///
/// `None` until something has been visited. Before any fact exists the graph
/// holds one source node per visited URL. Afterwards it holds one source node
/// per distinct fact source (first-seen order), one `f-<index>` node per fact
/// and a source → fact edge for each.
pub fn build_graph(state: &ResearchState, facts: &[Arc<Fact>]) -> Option<KnowledgeGraph> {
    if facts.is_empty() {
        let visited = state.visited_urls();
        if visited.is_empty() {
            return None;
        }
        let nodes = visited.into_iter().map(source_node).collect();
        return Some(KnowledgeGraph {
            nodes,
            edges: Vec::new(),
        });
    }

    let mut sources: Vec<GraphNode> = Vec::new();
    let mut fact_nodes = Vec::with_capacity(facts.len());
    let mut edges = Vec::with_capacity(facts.len());

    for (index, fact) in facts.iter().enumerate() {
        if !sources.iter().any(|s| s.id == fact.source_url) {
            sources.push(source_node(fact.source_url.clone()));
        }
        let id = format!("f-{index}");
        edges.push(GraphEdge {
            from: fact.source_url.clone(),
            to: id.clone(),
        });
        fact_nodes.push(GraphNode {
            id,
            label: fact.content.clone(),
            kind: NodeKind::Fact,
            iteration: state.fact_iteration(&fact.content),
        });
    }

    sources.extend(fact_nodes);
    Some(KnowledgeGraph {
        nodes: sources,
        edges,
    })
}

fn source_node(url: String) -> GraphNode {
    GraphNode {
        label: host_label(&url),
        id: url,
        kind: NodeKind::Source,
        iteration: None,
    }
}
