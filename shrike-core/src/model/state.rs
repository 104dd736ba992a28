//! Workflow state: the aggregate root for a single review run
//!
//! Stages mutate the state additively. A field is set once by the stage
//! that owns it or appended to; no stage overwrites another stage's
//! output. After terminal persistence the state is treated as immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Evidence, FixTask, HumanDecision, Hunk, ReviewIssue, Severity, SEVERITY_ORDER,
};
use crate::workflow::Stage;

/// Per-hunk evidence collections plus the fused top-K list
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalBundle {
    /// Index into the run's hunk list
    pub hunk_index: usize,
    pub local_context: Vec<Evidence>,
    pub similar_code: Vec<Evidence>,
    pub conventions: Vec<Evidence>,
    /// Reranked, deduplicated evidence across all three sources
    pub fused: Vec<Evidence>,
}

impl RetrievalBundle {
    pub fn empty(hunk_index: usize) -> Self {
        Self {
            hunk_index,
            ..Default::default()
        }
    }

    /// All first-pass evidence in source-priority order
    pub fn pooled(&self) -> Vec<&Evidence> {
        self.local_context
            .iter()
            .chain(self.conventions.iter())
            .chain(self.similar_code.iter())
            .collect()
    }

    /// Count across the three per-source lists (not the fused list)
    pub fn retrieved_count(&self) -> usize {
        self.local_context.len() + self.conventions.len() + self.similar_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retrieved_count() == 0
    }
}

/// Outcome of the guardrail validation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailResult {
    /// True iff no blocking reasons were recorded
    pub pass: bool,
    pub blocking_reasons: Vec<String>,
    /// Suspicious but not disqualifying findings
    pub warnings: Vec<String>,
    /// Names of the checks that actually ran, for audit completeness
    pub checks_performed: Vec<String>,
}

impl GuardrailResult {
    /// Build a result from accumulated check output; `pass` is derived,
    /// never supplied, so it cannot disagree with the blocking list.
    pub fn from_checks(
        blocking_reasons: Vec<String>,
        warnings: Vec<String>,
        checks_performed: Vec<String>,
    ) -> Self {
        Self {
            pass: blocking_reasons.is_empty(),
            blocking_reasons,
            warnings,
            checks_performed,
        }
    }

    /// Failed result for an internal guardrail error
    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            blocking_reasons: vec![reason.into()],
            warnings: Vec::new(),
            checks_performed: vec!["error".to_string()],
        }
    }
}

/// Aggregate state for one review run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Unique run identifier, `run-` plus twelve hex chars
    pub run_id: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub pr_number: Option<u64>,
    /// Head commit of the change under review
    pub pr_sha: Option<String>,
    /// Base commit the change applies against
    pub base_sha: Option<String>,
    pub stage: Stage,
    pub hunks: Vec<Hunk>,
    pub bundles: Vec<RetrievalBundle>,
    pub issues: Vec<ReviewIssue>,
    pub fix_tasks: Vec<FixTask>,
    pub guardrail: Option<GuardrailResult>,
    pub decision: Option<HumanDecision>,
    pub posted_comment_url: Option<String>,
    pub notification_sent: bool,
    /// Monotonically appended; never truncated or rewritten
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(repo_owner: impl Into<String>, repo_name: impl Into<String>) -> Self {
        let run_id = format!("run-{}", &Uuid::new_v4().simple().to_string()[..12]);
        Self {
            run_id,
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            pr_number: None,
            pr_sha: None,
            base_sha: None,
            stage: Stage::default(),
            hunks: Vec::new(),
            bundles: Vec::new(),
            issues: Vec::new(),
            fix_tasks: Vec::new(),
            guardrail: None,
            decision: None,
            posted_comment_url: None,
            notification_sent: false,
            errors: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Attach pull request identity
    pub fn with_pr(mut self, number: u64, head_sha: impl Into<String>) -> Self {
        self.pr_number = Some(number);
        self.pr_sha = Some(head_sha.into());
        self
    }

    /// Attach the base revision hunks were diffed against
    pub fn with_base(mut self, base_sha: impl Into<String>) -> Self {
        self.base_sha = Some(base_sha.into());
        self
    }

    /// Attach the hunks under review
    pub fn with_hunks(mut self, hunks: Vec<Hunk>) -> Self {
        self.hunks = hunks;
        self
    }

    /// `owner/name` form used in logs and summaries
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }

    /// Append to the error log with the failing stage as context
    pub fn record_error(&mut self, context: &str, detail: impl std::fmt::Display) {
        let entry = format!("{}: {}", context, detail);
        tracing::warn!(run_id = %self.run_id, error = %entry, "Recorded run error");
        self.errors.push(entry);
    }

    /// Issue counts per severity in display order, zero counts omitted
    pub fn severity_counts(&self) -> Vec<(Severity, usize)> {
        SEVERITY_ORDER
            .iter()
            .map(|&sev| (sev, self.issues.iter().filter(|i| i.severity == sev).count()))
            .filter(|&(_, n)| n > 0)
            .collect()
    }

    /// The most severe issue present, if any
    pub fn worst_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Issues carrying a given severity, preserving insertion order
    pub fn issues_with_severity(&self, severity: Severity) -> Vec<&ReviewIssue> {
        self.issues.iter().filter(|i| i.severity == severity).collect()
    }

    /// Look up fused evidence by id across every bundle
    pub fn evidence_by_id(&self, id: &str) -> Option<&Evidence> {
        self.bundles
            .iter()
            .flat_map(|b| b.fused.iter())
            .find(|e| e.id == id)
    }

    /// Total fused evidence items across all bundles
    pub fn fused_evidence_count(&self) -> usize {
        self.bundles.iter().map(|b| b.fused.len()).sum()
    }
}
