use ai_client::traits::EmbedAgent;
use ai_client::OpenAi;
use anyhow::Result;

use deepdive_common::DeepdiveError;

// --- TextEmbedder trait ---

#[async_trait::async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// OpenAI embeddings, widened to f64 for similarity math.
pub struct Embedder {
    client: OpenAi,
}

impl Embedder {
    pub fn new(client: OpenAi) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let vector = self.client.embed(text.to_string()).await?;
        if vector.is_empty() {
            return Err(DeepdiveError::Embedding(format!(
                "{} returned an empty vector",
                self.client.embedding_model()
            ))
            .into());
        }
        Ok(vector.into_iter().map(f64::from).collect())
    }
}
