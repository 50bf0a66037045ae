use std::sync::Arc;

use ai_client::{ChatAgent, Message};
use tracing::{info, warn};

use crate::knowledge::Fact;

/// Report text used when the model cannot produce one.
pub const REPORT_FAILURE: &str = "Error: Could not generate the final report.";

const REPORT_SYSTEM_PROMPT: &str = "You are an expert report writer. Synthesize the provided \
facts into a comprehensive, well-structured report that answers the user's original query. \
Use Markdown for formatting. Cite sources inline like this [Source: URL].";

pub struct ReportGenerator {
    llm: Arc<dyn ChatAgent>,
}

impl ReportGenerator {
    pub fn new(llm: Arc<dyn ChatAgent>) -> Self {
        Self { llm }
    }

    pub async fn final_report(&self, original_query: &str, facts: &[Arc<Fact>]) -> String {
        let messages = [
            Message::system(REPORT_SYSTEM_PROMPT),
            Message::user(format!(
                "Original Query: {original_query}\n\nKnowledge Base:\n{}",
                knowledge_base(facts)
            )),
        ];

        match self.llm.chat(&messages).await {
            Ok(report) => {
                info!(facts = facts.len(), bytes = report.len(), "Report generated");
                report
            }
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                REPORT_FAILURE.to_string()
            }
        }
    }
}

/// Facts grouped by source URL in first-seen order.
fn knowledge_base(facts: &[Arc<Fact>]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for fact in facts {
        match groups.iter_mut().find(|(url, _)| *url == fact.source_url) {
            Some((_, contents)) => contents.push(fact.content.as_str()),
            None => groups.push((fact.source_url.as_str(), vec![fact.content.as_str()])),
        }
    }
    groups
        .into_iter()
        .map(|(url, contents)| {
            let lines: Vec<String> = contents.iter().map(|c| format!("- {c}")).collect();
            format!("Source: {url}\nFacts:\n{}", lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn fact(content: &str, source: &str) -> Arc<Fact> {
        Arc::new(Fact {
            content: content.into(),
            source_url: source.into(),
            embedding: vec![1.0],
        })
    }

    #[test]
    fn knowledge_base_groups_by_source() {
        let text = knowledge_base(&[
            fact("a1", "https://a.com"),
            fact("b1", "https://b.com"),
            fact("a2", "https://a.com"),
        ]);
        assert_eq!(
            text,
            "Source: https://a.com\nFacts:\n- a1\n- a2\n\nSource: https://b.com\nFacts:\n- b1"
        );
        assert_eq!(knowledge_base(&[]), "");
    }

    #[tokio::test]
    async fn failure_returns_fixed_message() {
        let generator = ReportGenerator::new(Arc::new(ScriptedLlm::new()));
        assert_eq!(generator.final_report("q", &[]).await, REPORT_FAILURE);
    }

    #[tokio::test]
    async fn report_is_model_text() {
        let llm = Arc::new(ScriptedLlm::new().on_system("report writer", "# Report"));
        let generator = ReportGenerator::new(llm.clone());
        let report = generator
            .final_report("what is rust", &[fact("Rust is a language.", "https://r.org")])
            .await;
        assert_eq!(report, "# Report");
        assert!(llm.user_prompts("report writer")[0]
            .contains("Knowledge Base:\nSource: https://r.org\nFacts:\n- Rust is a language."));
    }
}
