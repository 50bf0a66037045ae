use serde::{Deserialize, Serialize};

// --- Progress ---

/// A complete, self-contained snapshot of a research run. Never a delta:
/// each update replaces the previous one for every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub research_id: String,
    pub message: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<KnowledgeGraph>,
}

impl ProgressUpdate {
    pub fn new(research_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            research_id: research_id.into(),
            message: message.into(),
            is_complete: false,
            final_report: None,
            knowledge_graph: None,
        }
    }

    /// True when this is a terminal event carrying an error message.
    pub fn is_error(&self) -> bool {
        self.is_complete && self.message.starts_with("Error:")
    }
}

// --- Knowledge graph ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Source,
    Fact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Visualization graph rebuilt from scratch on every progress emission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

// --- Evidence support matrix ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFact {
    pub id: String,
    pub label: String,
    pub source_id: String,
}

/// How strongly each source's facts support each fact from other sources.
/// `scores[s][f]` is in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMatrix {
    pub sources: Vec<EvidenceSource>,
    pub facts: Vec<EvidenceFact>,
    pub scores: Vec<Vec<f64>>,
}
