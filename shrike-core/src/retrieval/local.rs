//! Local-context evidence source
//!
//! Serves windows of the changed file as it stood at the base revision.
//! Base content is the one version both the reviewer and the model can
//! cite without circularity: the head-side lines are already in the hunk.
//! A newly added file has no base revision and contributes nothing; a
//! deleted file's base content is its last-known content and is served
//! normally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::model::{ChangeKind, Evidence, EvidenceSource, Hunk};
use crate::services::FileSource;

/// Fetches and caches same-file context around changed lines
pub struct LocalContextSource {
    files: Arc<dyn FileSource>,
    /// Keyed by (revision, path); one entry per file per run
    cache: Mutex<HashMap<(String, String), String>>,
}

impl LocalContextSource {
    pub fn new(files: Arc<dyn FileSource>) -> Self {
        Self {
            files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn content_cached(&self, revision: &str, path: &str) -> Option<String> {
        let key = (revision.to_string(), path.to_string());
        if let Some(content) = self.cache.lock().ok()?.get(&key) {
            return Some(content.clone());
        }

        match self.files.content_at(revision, path).await {
            Ok(Some(content)) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(key, content.clone());
                }
                Some(content)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(revision, path, error = %e, "Base content fetch failed");
                None
            }
        }
    }

    /// Up to `top_k` base-revision windows around the hunk's changed lines
    pub async fn retrieve(
        &self,
        hunk: &Hunk,
        base_revision: &str,
        top_k: usize,
        context_lines: u32,
    ) -> Vec<Evidence> {
        if top_k == 0 || hunk.change_kind == ChangeKind::Added {
            return Vec::new();
        }

        let path = hunk.base_path();
        let Some(content) = self.content_cached(base_revision, path).await else {
            return Vec::new();
        };

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len() as u32;
        if total == 0 {
            return Vec::new();
        }

        let (range_start, range_end) = hunk.old_range();
        let mut evidence = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for target in anchor_lines(range_start, range_end, top_k) {
            if target < 1 || target > total {
                continue;
            }

            let start_line = target.saturating_sub(context_lines).max(1);
            let end_line = (target + context_lines).min(total);
            let snippet = lines[(start_line - 1) as usize..end_line as usize].join("\n");
            if snippet.trim().is_empty() {
                continue;
            }

            // Same file, so relevance is axiomatic
            let Ok(item) = Evidence::new(
                EvidenceSource::LocalContext,
                path,
                start_line,
                end_line,
                snippet,
                1.0,
            ) else {
                continue;
            };

            if seen.insert(item.id.clone()) {
                evidence.push(item);
            }
        }

        evidence
    }
}

/// Spread `count` anchor lines evenly across an inclusive line range
fn anchor_lines(start: u32, end: u32, count: usize) -> Vec<u32> {
    if count == 0 || end < start {
        return Vec::new();
    }
    if count == 1 || start == end {
        return vec![start + (end - start) / 2];
    }

    let span = (end - start) as usize;
    let mut anchors = Vec::with_capacity(count);
    for i in 0..count {
        let offset = (span * i) / (count - 1);
        let line = start + offset as u32;
        if anchors.last() != Some(&line) {
            anchors.push(line);
        }
    }
    anchors
}
