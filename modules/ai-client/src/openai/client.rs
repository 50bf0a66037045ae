use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

use super::types::*;
use crate::error::AiError;
use crate::util::truncate_to_char_boundary;

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// POST `body` to `path` and return the raw response text of a 2xx reply.
    async fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<String, AiError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_to_char_boundary(&text, 500).to_string());
            return Err(AiError::Api {
                status: status.as_u16(),
                body: detail,
            });
        }
        Ok(text)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiError> {
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI chat request");
        let text = self.post("chat/completions", request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, AiError> {
        let request = EmbeddingRequest {
            model: model.to_string(),
            input: serde_json::Value::Array(vec![serde_json::Value::String(text.to_string())]),
        };

        debug!(model, chars = text.len(), "OpenAI embedding request");
        let body = self.post("embeddings", &request).await?;
        let embed_response: EmbeddingResponse = serde_json::from_str(&body)?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(AiError::Empty("no embedding in response"))
    }
}
