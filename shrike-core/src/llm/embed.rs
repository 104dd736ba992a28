//! Embedding client for an Ollama-style `/api/embeddings` endpoint

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::services::Embedder;
use crate::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP embedding client
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::Retrieval("Cannot embed empty text".to_string()));
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbedResponse = response.json().await?;

        // Vector width disagreements poison every downstream search, so
        // reject them here rather than at the index
        if parsed.embedding.len() != self.dimension {
            return Err(Error::Retrieval(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                parsed.embedding.len()
            )));
        }

        debug!(model = %self.model, text_len = text.len(), "Embedded query text");

        Ok(parsed.embedding)
    }
}
