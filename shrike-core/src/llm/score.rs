//! Cross-encoder rerank client
//!
//! Speaks the `/rerank` API exposed by text-embeddings-inference style
//! servers: query plus candidate texts in, one raw relevance score per
//! text out. Scores are logits; normalization happens at the fusion
//! layer, not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::services::RerankScorer;
use crate::{Error, Result};

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// HTTP rerank scorer
#[derive(Debug, Clone)]
pub struct HttpRerankScorer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRerankScorer {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RerankScorer for HttpRerankScorer {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.base_url);
        let request = RerankRequest { query, texts };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ranked: Vec<RankedText> = response.json().await?;

        // The server returns results sorted by score; put them back in
        // input order so callers can zip scores with their candidates
        let mut scores = vec![0.0_f32; texts.len()];
        for item in ranked {
            if item.index >= texts.len() {
                return Err(Error::Retrieval(format!(
                    "Rerank response index {} out of range for {} texts",
                    item.index,
                    texts.len()
                )));
            }
            scores[item.index] = item.score;
        }

        Ok(scores)
    }
}

/// Defers client construction to the first scoring call
///
/// Not every run reaches the fusion step with evidence in hand, so the
/// underlying client is built on first use rather than at startup.
pub struct LazyRerankScorer {
    url: String,
    inner: OnceCell<HttpRerankScorer>,
}

impl LazyRerankScorer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: OnceCell::new(),
        }
    }
}

#[async_trait]
impl RerankScorer for LazyRerankScorer {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let client = self
            .inner
            .get_or_try_init(|| async {
                debug!(url = %self.url, "Initializing rerank client");
                HttpRerankScorer::new(&self.url)
            })
            .await?;

        client.score_pairs(query, texts).await
    }
}
