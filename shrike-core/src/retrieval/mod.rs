//! Evidence retrieval pipeline
//!
//! For every hunk, three independent sources are queried concurrently
//! with individual timeouts, their results pooled, and the pool fused
//! into a ranked top-K list. A failing source contributes nothing; the
//! stage itself never fails the run.

mod conventions;
mod local;
mod rerank;
mod similar;

pub use conventions::ConventionsSource;
pub use local::LocalContextSource;
pub use rerank::fuse;
pub use similar::SimilarCodeSource;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::error::Elapsed;
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::model::{Evidence, Hunk, RetrievalBundle};
use crate::services::{RerankScorer, Services};
use crate::Result;

/// Bundles plus the degradations hit while building them
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    /// One bundle per hunk, in hunk order
    pub bundles: Vec<RetrievalBundle>,
    /// Source failures, for the run's error log
    pub errors: Vec<String>,
}

/// Assembles a [`RetrievalBundle`] for each hunk
#[derive(Clone)]
pub struct RetrievalStage {
    local: Arc<LocalContextSource>,
    similar: Arc<SimilarCodeSource>,
    conventions: Arc<ConventionsSource>,
    scorer: Option<Arc<dyn RerankScorer>>,
    config: RetrievalConfig,
}

impl RetrievalStage {
    pub fn new(services: &Services, config: &RetrievalConfig) -> Self {
        Self {
            local: Arc::new(LocalContextSource::new(services.files.clone())),
            similar: Arc::new(SimilarCodeSource::new(
                services.embedder.clone(),
                services.code_index.clone(),
            )),
            conventions: Arc::new(ConventionsSource::new(
                services.embedder.clone(),
                services.conventions_index.clone(),
            )),
            scorer: services.scorer.clone(),
            config: config.clone(),
        }
    }

    /// Retrieve evidence for every hunk, bounded by the worker pool size
    ///
    /// Bundles come back in hunk order regardless of completion order.
    pub async fn run(&self, hunks: &[Hunk], repo: &str, base_revision: &str) -> RetrievalOutcome {
        let mut outcome = RetrievalOutcome::default();
        if hunks.is_empty() {
            return outcome;
        }

        info!(hunks = hunks.len(), repo, "Retrieving evidence");

        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool.max(1)));
        let mut handles = Vec::with_capacity(hunks.len());

        for (index, hunk) in hunks.iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let stage = self.clone();
            let hunk = hunk.clone();
            let repo = repo.to_string();
            let base = base_revision.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                stage.bundle_for_hunk(index, &hunk, &repo, &base).await
            }));
        }

        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok((bundle, errors)) => {
                    outcome.errors.extend(errors);
                    outcome.bundles.push(bundle);
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("retrieval task for hunk {} aborted: {}", index, e));
                    outcome.bundles.push(RetrievalBundle::empty(index));
                }
            }
        }

        let total: usize = outcome.bundles.iter().map(RetrievalBundle::retrieved_count).sum();
        info!(
            evidence = total,
            degraded = outcome.errors.len(),
            "Retrieval complete"
        );
        outcome
    }

    async fn bundle_for_hunk(
        &self,
        index: usize,
        hunk: &Hunk,
        repo: &str,
        base_revision: &str,
    ) -> (RetrievalBundle, Vec<String>) {
        let query = hunk.change_text();
        let timeout = self.config.source_timeout;
        let mut errors = Vec::new();

        // No data dependency between sources, so fetch them together and
        // wait for all three (or their timeouts)
        let (local_res, similar_res, conventions_res) = tokio::join!(
            tokio::time::timeout(
                timeout,
                self.local.retrieve(
                    hunk,
                    base_revision,
                    self.config.local_top_k,
                    self.config.context_lines,
                ),
            ),
            tokio::time::timeout(
                timeout,
                self.similar.retrieve(
                    &query,
                    repo,
                    &hunk.file_path,
                    self.config.similar_top_k,
                    self.config.min_similarity,
                ),
            ),
            tokio::time::timeout(
                timeout,
                self.conventions.retrieve(
                    &query,
                    language_of(&hunk.file_path),
                    self.config.conventions_top_k,
                    self.config.conventions_min_similarity,
                ),
            ),
        );

        let mut bundle = RetrievalBundle::empty(index);
        bundle.local_context = match local_res {
            Ok(list) => list,
            Err(_) => {
                errors.push(timeout_message("local-context", hunk, timeout));
                Vec::new()
            }
        };
        bundle.similar_code = flatten_source("similar-code", hunk, timeout, similar_res, &mut errors);
        bundle.conventions =
            flatten_source("convention", hunk, timeout, conventions_res, &mut errors);

        let pooled: Vec<Evidence> = bundle.pooled().into_iter().cloned().collect();
        bundle.fused = fuse(
            self.scorer.as_ref(),
            &query,
            pooled,
            self.config.rerank_top_k,
        )
        .await;

        debug!(
            hunk = index,
            file = %hunk.file_path,
            local = bundle.local_context.len(),
            similar = bundle.similar_code.len(),
            conventions = bundle.conventions.len(),
            fused = bundle.fused.len(),
            "Bundle assembled"
        );

        (bundle, errors)
    }
}

fn timeout_message(source: &str, hunk: &Hunk, timeout: Duration) -> String {
    format!(
        "{} source timed out after {:?} for {}:{}",
        source, timeout, hunk.file_path, hunk.new_start
    )
}

fn flatten_source(
    source: &str,
    hunk: &Hunk,
    timeout: Duration,
    result: std::result::Result<Result<Vec<Evidence>>, Elapsed>,
    errors: &mut Vec<String>,
) -> Vec<Evidence> {
    match result {
        Ok(Ok(list)) => list,
        Ok(Err(e)) => {
            errors.push(format!(
                "{} source failed for {}:{}: {}",
                source, hunk.file_path, hunk.new_start, e
            ));
            Vec::new()
        }
        Err(_) => {
            errors.push(timeout_message(source, hunk, timeout));
            Vec::new()
        }
    }
}

/// Map a file extension to the language tag used by the conventions index
fn language_of(path: &str) -> Option<&'static str> {
    let extension = std::path::Path::new(path).extension()?.to_str()?;
    match extension {
        "rs" => Some("rust"),
        "py" => Some("python"),
        "js" | "jsx" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "go" => Some("go"),
        "java" => Some("java"),
        "rb" => Some("ruby"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "hpp" => Some("cpp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::model::{ChangeKind, DiffLine, EvidenceSource, LineKind};
    use crate::services::{
        AuditSink, Embedder, FileSource, Generator, SearchFilters, SearchHit, VectorIndex,
    };
    use crate::model::WorkflowState;
    use std::path::PathBuf;

    struct StubFiles {
        files: HashMap<(String, String), String>,
    }

    #[async_trait]
    impl FileSource for StubFiles {
        async fn content_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
            Ok(self
                .files
                .get(&(revision.to_string(), path.to_string()))
                .cloned())
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1; 4])
        }
    }

    struct StubIndex {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn search(
            &self,
            _vector: &[f32],
            _filters: &SearchFilters,
            _top_k: usize,
        ) -> Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn search(
            &self,
            _vector: &[f32],
            _filters: &SearchFilters,
            _top_k: usize,
        ) -> Result<Vec<SearchHit>> {
            Err(crate::Error::Retrieval("index unreachable".to_string()))
        }
    }

    struct StubGenerator;

    #[async_trait]
    impl Generator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    struct StubAudit;

    #[async_trait]
    impl AuditSink for StubAudit {
        async fn save(&self, _run_id: &str, _state: &WorkflowState) -> Result<PathBuf> {
            Ok(PathBuf::from("/dev/null"))
        }
    }

    fn services(code_hits: Vec<SearchHit>, conventions_ok: bool) -> Services {
        let mut files = HashMap::new();
        files.insert(
            ("base000".to_string(), "src/auth.rs".to_string()),
            (1..=40)
                .map(|i| format!("line {}", i))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let conventions_index: Arc<dyn VectorIndex> = if conventions_ok {
            Arc::new(StubIndex {
                hits: vec![SearchHit {
                    chunk_id: "rule-1".to_string(),
                    content: "Propagate errors instead of unwrapping".to_string(),
                    file_path: "CONVENTIONS.md".to_string(),
                    start_line: 4,
                    end_line: 4,
                    score: 0.8,
                    category: Some("style".to_string()),
                }],
            })
        } else {
            Arc::new(FailingIndex)
        };

        Services {
            files: Arc::new(StubFiles { files }),
            code_index: Arc::new(StubIndex { hits: code_hits }),
            conventions_index,
            embedder: Arc::new(StubEmbedder),
            generator: Arc::new(StubGenerator),
            scorer: None,
            publisher: None,
            notifier: None,
            audit: Arc::new(StubAudit),
        }
    }

    fn sample_hunk() -> Hunk {
        Hunk {
            file_path: "src/auth.rs".to_string(),
            old_path: None,
            change_kind: ChangeKind::Modified,
            old_start: 10,
            old_count: 2,
            new_start: 10,
            new_count: 2,
            section: String::new(),
            lines: vec![DiffLine {
                kind: LineKind::Added,
                content: "let token = generate_token();".to_string(),
                old_line: None,
                new_line: Some(10),
            }],
        }
    }

    fn code_hit(chunk: &str, file: &str) -> SearchHit {
        SearchHit {
            chunk_id: chunk.to_string(),
            content: "fn other_token() {}".to_string(),
            file_path: file.to_string(),
            start_line: 1,
            end_line: 2,
            score: 0.85,
            category: None,
        }
    }

    #[tokio::test]
    async fn test_bundle_combines_all_sources() {
        let services = services(vec![code_hit("c1", "src/token.rs")], true);
        let stage = RetrievalStage::new(&services, &RetrievalConfig::default());

        let outcome = stage
            .run(&[sample_hunk()], "acme/widgets", "base000")
            .await;

        assert_eq!(outcome.bundles.len(), 1);
        assert!(outcome.errors.is_empty());
        let bundle = &outcome.bundles[0];
        assert!(!bundle.local_context.is_empty());
        assert_eq!(bundle.similar_code.len(), 1);
        assert_eq!(bundle.conventions.len(), 1);
        assert!(!bundle.fused.is_empty());
        // Priority fallback ordering puts local context first
        assert_eq!(bundle.fused[0].source, EvidenceSource::LocalContext);
    }

    #[tokio::test]
    async fn test_failed_source_degrades_to_empty() {
        let services = services(vec![code_hit("c1", "src/token.rs")], false);
        let stage = RetrievalStage::new(&services, &RetrievalConfig::default());

        let outcome = stage
            .run(&[sample_hunk()], "acme/widgets", "base000")
            .await;

        let bundle = &outcome.bundles[0];
        assert!(bundle.conventions.is_empty());
        assert!(!bundle.similar_code.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("convention"));
    }

    #[tokio::test]
    async fn test_bundles_ordered_by_hunk() {
        let services = services(Vec::new(), true);
        let stage = RetrievalStage::new(&services, &RetrievalConfig::default());

        let mut second = sample_hunk();
        second.old_start = 30;
        second.new_start = 30;
        let hunks = vec![sample_hunk(), second];

        let outcome = stage.run(&hunks, "acme/widgets", "base000").await;
        assert_eq!(outcome.bundles.len(), 2);
        assert_eq!(outcome.bundles[0].hunk_index, 0);
        assert_eq!(outcome.bundles[1].hunk_index, 1);
    }

    #[test]
    fn test_language_mapping() {
        assert_eq!(language_of("src/main.rs"), Some("rust"));
        assert_eq!(language_of("app/views.py"), Some("python"));
        assert_eq!(language_of("README.md"), None);
        assert_eq!(language_of("Makefile"), None);
    }
}
