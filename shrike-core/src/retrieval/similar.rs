//! Similar-code evidence source
//!
//! Embeds the hunk's changed text and searches the repository's code
//! index. Over-fetches double the requested count because hits from the
//! hunk's own file and duplicate chunks are discarded afterwards.

use std::sync::Arc;

use tracing::debug;

use crate::services::{Embedder, SearchFilters, VectorIndex};
use crate::model::{Evidence, EvidenceSource};
use crate::Result;

pub struct SimilarCodeSource {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl SimilarCodeSource {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `top_k` similar snippets from other files in the repository
    pub async fn retrieve(
        &self,
        query: &str,
        repo: &str,
        exclude_file: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<Evidence>> {
        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let filters = SearchFilters::repository(repo).excluding_file(exclude_file);
        let hits = self.index.search(&vector, &filters, top_k * 2).await?;

        let mut evidence = Vec::new();
        let mut seen_chunks = std::collections::HashSet::new();

        for hit in hits {
            // The index-side exclusion filter is advisory; enforce here too
            if hit.file_path == exclude_file {
                continue;
            }
            if hit.score < min_similarity {
                continue;
            }
            if !seen_chunks.insert(hit.chunk_id.clone()) {
                continue;
            }

            let end_line = hit.end_line.max(hit.start_line);
            match Evidence::new(
                EvidenceSource::SimilarCode,
                hit.file_path,
                hit.start_line.max(1),
                end_line.max(1),
                hit.content,
                hit.score.clamp(0.0, 1.0),
            ) {
                Ok(item) => evidence.push(item),
                Err(e) => {
                    debug!(chunk_id = %hit.chunk_id, error = %e, "Skipping malformed search hit");
                }
            }

            if evidence.len() >= top_k {
                break;
            }
        }

        Ok(evidence)
    }
}
