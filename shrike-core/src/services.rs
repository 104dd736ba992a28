//! External service seams for the review workflow
//!
//! Every capability the workflow consumes from outside lives behind one of
//! these traits: file content, vector search, embeddings, text generation,
//! rerank scoring, comment publication, notification, and the audit sink.
//! Stages hold `Arc<dyn Trait>` handles so tests can substitute in-process
//! stubs without touching any stage logic.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::WorkflowState;
use crate::Result;

/// Filters applied to a vector search
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict to one repository's chunks
    pub repository: Option<String>,
    /// Drop hits from this file (self-similarity noise)
    pub exclude_file: Option<String>,
    /// Convention category, e.g. "security" or "style"
    pub category: Option<String>,
    /// Programming language tag
    pub language: Option<String>,
}

impl SearchFilters {
    pub fn repository(repo: impl Into<String>) -> Self {
        Self {
            repository: Some(repo.into()),
            ..Default::default()
        }
    }

    pub fn excluding_file(mut self, path: impl Into<String>) -> Self {
        self.exclude_file = Some(path.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// One result from a vector search
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The index's native chunk identity, used for deduplication
    pub chunk_id: String,
    pub content: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    /// First-pass similarity in [0, 1]
    pub score: f64,
    /// Convention category tag, absent for code chunks
    pub category: Option<String>,
}

/// Reads file content at a specific revision
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Fetch `path` as of `revision`; `Ok(None)` when the file does not
    /// exist at that revision (new files at base, deleted files at head)
    async fn content_at(&self, revision: &str, path: &str) -> Result<Option<String>>;
}

/// A file source with no files, for runs without a local checkout
///
/// Local-context retrieval degrades to empty rather than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFileSource;

#[async_trait]
impl FileSource for NullFileSource {
    async fn content_at(&self, _revision: &str, _path: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Similarity search over an embedded corpus
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// Produces embedding vectors for query text
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Opaque text generation: prompt in, completion out
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Joint relevance scoring of (query, text) pairs for reranking
#[async_trait]
pub trait RerankScorer: Send + Sync {
    /// Raw scores, one per text, not yet normalized
    async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

/// Posts the finished review where reviewers will see it
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns the URL of the posted comment
    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<String>;
}

/// Best-effort notification delivery; must never fail the run
#[async_trait]
pub trait Notifier: Send + Sync {
    /// True if the payload was delivered
    async fn notify(&self, payload: &serde_json::Value) -> bool;
}

/// Writes the audit record; the one service whose failure is fatal
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist the state, returning the path of the written record
    async fn save(&self, run_id: &str, state: &WorkflowState) -> Result<PathBuf>;
}

/// The full set of services a review run is wired with
///
/// Required services are always present; optional ones depend on how the
/// run was launched (no publisher in local mode, no notifier when webhooks
/// are disabled, no scorer when reranking falls back to source priority).
#[derive(Clone)]
pub struct Services {
    pub files: Arc<dyn FileSource>,
    /// Repository-scoped code chunks
    pub code_index: Arc<dyn VectorIndex>,
    /// Project conventions and style-guide statements
    pub conventions_index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub scorer: Option<Arc<dyn RerankScorer>>,
    pub publisher: Option<Arc<dyn Publisher>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub audit: Arc<dyn AuditSink>,
}

impl Services {
    /// Wire up the required services; optional ones default to absent.
    pub fn new(
        files: Arc<dyn FileSource>,
        code_index: Arc<dyn VectorIndex>,
        conventions_index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            files,
            code_index,
            conventions_index,
            embedder,
            generator,
            scorer: None,
            publisher: None,
            notifier: None,
            audit,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RerankScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("scorer", &self.scorer.is_some())
            .field("publisher", &self.publisher.is_some())
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}
