//! Vector index client speaking the Qdrant REST search API
//!
//! One client per collection; the code index and the conventions index
//! are separate instances pointed at separate collections.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::services::{SearchFilters, SearchHit, VectorIndex};
use crate::{Error, Result};

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: Option<Payload>,
}

/// Payload fields written at ingest time; extra fields are ignored
#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    chunk_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    start_line: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default)]
    category: Option<String>,
}

/// HTTP client for one vector collection
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(url: &str, collection: &str, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
        })
    }

    fn build_filter(filters: &SearchFilters) -> Option<Value> {
        let mut must = Vec::new();
        let mut must_not = Vec::new();

        if let Some(ref repo) = filters.repository {
            must.push(json!({"key": "repo", "match": {"value": repo}}));
        }
        if let Some(ref category) = filters.category {
            must.push(json!({"key": "category", "match": {"value": category}}));
        }
        if let Some(ref language) = filters.language {
            must.push(json!({"key": "language", "match": {"value": language}}));
        }
        if let Some(ref path) = filters.exclude_file {
            must_not.push(json!({"key": "file_path", "match": {"value": path}}));
        }

        if must.is_empty() && must_not.is_empty() {
            return None;
        }

        let mut filter = serde_json::Map::new();
        if !must.is_empty() {
            filter.insert("must".to_string(), Value::Array(must));
        }
        if !must_not.is_empty() {
            filter.insert("must_not".to_string(), Value::Array(must_not));
        }
        Some(Value::Object(filter))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        vector: &[f32],
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filter) = Self::build_filter(filters) {
            body["filter"] = filter;
        }

        let mut request = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let parsed: SearchResponse = response.json().await?;

        let hits = parsed
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                Some(SearchHit {
                    chunk_id: payload.chunk_id?,
                    content: payload.content?,
                    file_path: payload.file_path?,
                    start_line: payload.start_line.unwrap_or(1),
                    end_line: payload.end_line.unwrap_or(1),
                    score: point.score,
                    category: payload.category,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            collection = %self.collection,
            requested = top_k,
            returned = hits.len(),
            "Vector search complete"
        );

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_with_repo_and_exclusion() {
        let filters = SearchFilters::repository("acme/widgets").excluding_file("src/main.rs");
        let filter = QdrantIndex::build_filter(&filters).unwrap();

        assert_eq!(filter["must"][0]["key"], "repo");
        assert_eq!(filter["must"][0]["match"]["value"], "acme/widgets");
        assert_eq!(filter["must_not"][0]["key"], "file_path");
        assert_eq!(filter["must_not"][0]["match"]["value"], "src/main.rs");
    }

    #[test]
    fn test_empty_filters_omitted() {
        let filters = SearchFilters::default();
        assert!(QdrantIndex::build_filter(&filters).is_none());
    }

    #[test]
    fn test_category_filter() {
        let filters = SearchFilters::default().with_category("error-handling");
        let filter = QdrantIndex::build_filter(&filters).unwrap();
        assert_eq!(filter["must"][0]["key"], "category");
    }
}
