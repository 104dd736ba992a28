//! Domain model for review runs
//!
//! Everything here is serde-serializable; the workflow state and all of its
//! parts round-trip through JSON for checkpointing and the audit record.

mod decision;
mod evidence;
mod hunk;
mod issue;
mod plan;
mod state;

pub use decision::{DecisionAction, HumanDecision};
pub use evidence::{content_hash, Evidence, EvidenceSource};
pub use hunk::{ChangeKind, DiffLine, FileDiff, Hunk, LineKind};
pub use issue::{Category, ReviewIssue, Severity, SEVERITY_ORDER};
pub use plan::{EffortTier, FixTask};
pub use state::{GuardrailResult, RetrievalBundle, WorkflowState};
