//! Convention evidence source
//!
//! Searches the project-conventions index for rules relevant to the
//! change. Each hit's text is prefixed with its category so the tag
//! survives into citations after fusion mixes conventions in with code
//! evidence.

use std::sync::Arc;

use tracing::debug;

use crate::services::{Embedder, SearchFilters, VectorIndex};
use crate::model::{Evidence, EvidenceSource};
use crate::Result;

pub struct ConventionsSource {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl ConventionsSource {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `top_k` convention statements relevant to the query
    pub async fn retrieve(
        &self,
        query: &str,
        language: Option<&str>,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<Evidence>> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let mut filters = SearchFilters::default();
        if let Some(lang) = language {
            filters = filters.with_language(lang);
        }
        let hits = self.index.search(&vector, &filters, top_k).await?;

        let mut evidence = Vec::new();
        for hit in hits {
            if hit.score < min_similarity {
                continue;
            }

            let category = hit.category.as_deref().unwrap_or("general");
            let content = format!("[{}] {}", category.to_uppercase(), hit.content);
            let start = hit.start_line.max(1);

            match Evidence::new(
                EvidenceSource::Convention,
                hit.file_path,
                start,
                hit.end_line.max(start),
                content,
                hit.score.clamp(0.0, 1.0),
            ) {
                Ok(item) => evidence.push(item),
                Err(e) => {
                    debug!(chunk_id = %hit.chunk_id, error = %e, "Skipping malformed convention hit");
                }
            }
        }

        Ok(evidence)
    }
}
