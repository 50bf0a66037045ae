use std::sync::Arc;

use ai_client::{ChatAgent, Message};
use tracing::warn;

use crate::knowledge::Fact;

/// Number of most recent facts shown to the planner.
pub const PLANNER_FACT_WINDOW: usize = 15;

const PLANNER_SYSTEM_PROMPT: &str = "You are a strategic research planner. Return ONLY the \
single best search query text, without quotes, for the next step.";

/// Chooses the search query for the next iteration.
pub struct QueryPlanner {
    llm: Arc<dyn ChatAgent>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn ChatAgent>) -> Self {
        Self { llm }
    }

    /// Ask the model for a refined query. Falls back to `original_query` when
    /// the model fails or answers with nothing.
    pub async fn next_query(&self, original_query: &str, facts: &[Arc<Fact>]) -> String {
        let recent = &facts[facts.len().saturating_sub(PLANNER_FACT_WINDOW)..];
        let summary = recent
            .iter()
            .map(|f| format!("- {}", f.content))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(format!(
                "Original Query: {original_query}\n\nRecent Facts:\n{summary}"
            )),
        ];

        match self.llm.chat(&messages).await {
            Ok(text) => {
                let query = clean_query(&text);
                if query.is_empty() {
                    original_query.to_string()
                } else {
                    query.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Query planning failed, reusing original query");
                original_query.to_string()
            }
        }
    }
}

/// Trim and remove one layer of surrounding `"` and then `'` quotes.
pub fn clean_query(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unquoted = strip_surrounding(trimmed, '"');
    strip_surrounding(unquoted, '\'').trim()
}

fn strip_surrounding(s: &str, quote: char) -> &str {
    s.strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
        .unwrap_or(s)
}
