use std::sync::{Arc, LazyLock};

use ai_client::{strip_code_blocks, truncate_to_char_boundary, ChatAgent, Message};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const MAX_CONTENT_BYTES: usize = 30_000;
const HEURISTIC_MAX_FACTS: usize = 5;
const HEURISTIC_FALLBACK_SENTENCES: usize = 3;
const IDEAL_SENTENCE_CHARS: usize = 140;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert fact extractor. Return ONLY valid JSON \
with this exact shape and nothing else: {\"facts\": [\"...\", \"...\"]}. Each fact must be a \
distinct, atomic, concise sentence relevant to the user's original query.";

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid keyword regex"));

/// What the model is asked to return.
#[derive(Debug, Default, Deserialize)]
struct FactsPayload {
    #[serde(default)]
    facts: Vec<String>,
}

/// Inputs visible to each extraction strategy.
struct Attempt<'a> {
    response: &'a str,
    content: &'a str,
    query: &'a str,
}

type Strategy = fn(&Attempt<'_>) -> Vec<String>;

/// Tried in order; the first non-empty result wins.
const STRATEGIES: [(&str, Strategy); 3] = [
    ("json", from_json),
    ("markers", from_markers),
    ("heuristic", from_content),
];

fn from_json(a: &Attempt<'_>) -> Vec<String> {
    parse_json_facts(a.response)
}

fn from_markers(a: &Attempt<'_>) -> Vec<String> {
    parse_marked_facts(a.response)
}

fn from_content(a: &Attempt<'_>) -> Vec<String> {
    heuristic_facts(a.content, a.query)
}

/// Turns page text into atomic facts relevant to the research query.
pub struct FactExtractor {
    llm: Arc<dyn ChatAgent>,
}

impl FactExtractor {
    pub fn new(llm: Arc<dyn ChatAgent>) -> Self {
        Self { llm }
    }

    /// Extract facts from `content`. A failed or unusable model response
    /// degrades to marker parsing and then to the sentence heuristic.
    pub async fn extract_facts(&self, content: &str, original_query: &str) -> Vec<String> {
        let content = truncate_to_char_boundary(content, MAX_CONTENT_BYTES);
        let messages = [
            Message::system(EXTRACTION_SYSTEM_PROMPT),
            Message::user(format!(
                "Original Query: {original_query}\n\nText to analyze (may be truncated):\n{content}"
            )),
        ];

        let response = match self.llm.chat(&messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Fact extraction call failed, using heuristic");
                String::new()
            }
        };

        let attempt = Attempt {
            response: strip_code_blocks(&response),
            content,
            query: original_query,
        };
        for (name, strategy) in STRATEGIES {
            let facts = strategy(&attempt);
            if !facts.is_empty() {
                debug!(strategy = name, count = facts.len(), "Facts extracted");
                return facts;
            }
        }
        Vec::new()
    }
}

/// Facts from a `{"facts": [...]}` payload, trimmed, blanks dropped.
pub fn parse_json_facts(response: &str) -> Vec<String> {
    serde_json::from_str::<FactsPayload>(response)
        .map(|payload| clean_all(payload.facts))
        .unwrap_or_default()
}

/// Facts from lines starting with `FACT:`, `- ` or `*`. Stacked markers are
/// stripped in that order.
pub fn parse_marked_facts(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("FACT:") || line.starts_with("- ") || line.starts_with('*'))
        .map(|line| {
            let line = line.strip_prefix("FACT:").unwrap_or(line).trim_start();
            let line = line.strip_prefix("- ").unwrap_or(line).trim_start();
            line.strip_prefix('*').unwrap_or(line).trim().to_string()
        })
        .filter(|fact| !fact.is_empty())
        .collect()
}

/// Pick up to five sentences from the page itself, favouring ones that
/// mention query keywords and ones close to 140 characters long. Falls back
/// to the first three sentences when nothing qualifies.
pub fn heuristic_facts(content: &str, query: &str) -> Vec<String> {
    let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Vec::new();
    }
    let sentences = split_sentences(&text);

    let lowered_query = query.to_lowercase();
    let mut keywords: Vec<&str> = NON_WORD
        .split(&lowered_query)
        .filter(|w| w.len() >= 4)
        .collect();
    keywords.sort_unstable();
    keywords.dedup();

    let mut scored: Vec<(&str, usize)> = sentences
        .iter()
        .map(|s| {
            let lowered = s.to_lowercase();
            let score = keywords.iter().filter(|kw| lowered.contains(*kw)).count();
            (*s, score)
        })
        .filter(|(s, score)| *score > 0 || (50..=280).contains(&s.chars().count()))
        .collect();
    scored.sort_by_key(|(s, score)| {
        (
            std::cmp::Reverse(*score),
            s.chars().count().abs_diff(IDEAL_SENTENCE_CHARS),
        )
    });

    let mut picked: Vec<String> = Vec::new();
    for (sentence, _) in scored {
        if picked.len() == HEURISTIC_MAX_FACTS {
            break;
        }
        if !picked.iter().any(|p| p == sentence) {
            picked.push(sentence.to_string());
        }
    }

    if picked.is_empty() {
        sentences
            .into_iter()
            .take(HEURISTIC_FALLBACK_SENTENCES)
            .map(str::to_string)
            .collect()
    } else {
        picked
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        sentences.push(text[start..m.start() + 1].trim());
        start = m.end();
    }
    if start < text.len() {
        sentences.push(text[start..].trim());
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

fn clean_all(facts: Vec<String>) -> Vec<String> {
    facts
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}
