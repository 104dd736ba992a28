//! Evidence fusion and reranking
//!
//! First-pass similarity scores are not comparable across sources: each
//! source ran its own nearest-neighbor search against a different corpus.
//! A cross-encoder scores every (query, evidence) pair jointly, the raw
//! logits are squashed through a sigmoid into [0, 1], and the pooled
//! candidates are cut to the top K. Without a scorer the pool falls back
//! to source-priority order, which at least keeps the cheap-to-verify
//! evidence first.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::Evidence;
use crate::services::RerankScorer;

/// Logistic squash of a raw cross-encoder logit into [0, 1]
fn sigmoid(score: f32) -> f64 {
    1.0 / (1.0 + (-f64::from(score)).exp())
}

/// Drop pooled duplicates, keeping the first occurrence of each id
fn dedup_by_id(pooled: Vec<Evidence>) -> Vec<Evidence> {
    let mut seen = std::collections::HashSet::new();
    pooled
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Order evidence by source priority, then first-pass score within a source
fn priority_order(mut pool: Vec<Evidence>) -> Vec<Evidence> {
    pool.sort_by(|a, b| {
        a.source
            .priority()
            .cmp(&b.source.priority())
            .then(b.score.total_cmp(&a.score))
    });
    pool
}

/// Fuse pooled evidence into a top-K ranked list
///
/// Scorer failure degrades to priority ordering rather than failing the
/// hunk; reduced ranking quality is still usable evidence.
pub async fn fuse(
    scorer: Option<&Arc<dyn RerankScorer>>,
    query: &str,
    pooled: Vec<Evidence>,
    top_k: usize,
) -> Vec<Evidence> {
    let pooled = dedup_by_id(pooled);
    if pooled.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let Some(scorer) = scorer else {
        debug!("No rerank scorer configured, using source-priority order");
        let mut fallback = priority_order(pooled);
        fallback.truncate(top_k);
        return fallback;
    };

    let texts: Vec<String> = pooled.iter().map(|e| e.content.clone()).collect();
    let scores = match scorer.score_pairs(query, &texts).await {
        Ok(scores) if scores.len() == pooled.len() => scores,
        Ok(scores) => {
            warn!(
                expected = pooled.len(),
                got = scores.len(),
                "Rerank scorer returned wrong count, using source-priority order"
            );
            let mut fallback = priority_order(pooled);
            fallback.truncate(top_k);
            return fallback;
        }
        Err(e) => {
            warn!(error = %e, "Rerank scoring failed, using source-priority order");
            let mut fallback = priority_order(pooled);
            fallback.truncate(top_k);
            return fallback;
        }
    };

    let mut rescored: Vec<Evidence> = pooled
        .iter()
        .zip(scores)
        .map(|(evidence, raw)| evidence.with_score(sigmoid(raw)))
        .collect();

    // Descending score; ties go to the source that is cheaper to verify
    rescored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.source.priority().cmp(&b.source.priority()))
    });
    rescored.truncate(top_k);
    rescored
}
