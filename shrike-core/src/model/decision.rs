//! Human approval decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the human chose to do with the generated review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Publish the review verbatim
    Approve,
    /// Publish human-edited content instead of the generated review
    Edit,
    /// Terminate without publishing
    Reject,
    /// Publish a condensed version without per-issue detail
    SummaryOnly,
}

impl DecisionAction {
    /// Whether this action leads to a publish attempt
    pub fn publishes(&self) -> bool {
        !matches!(self, DecisionAction::Reject)
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionAction::Approve => "approve",
            DecisionAction::Edit => "edit",
            DecisionAction::Reject => "reject",
            DecisionAction::SummaryOnly => "summary_only",
        };
        write!(f, "{}", s)
    }
}

/// A timestamped decision collected at the approval gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanDecision {
    pub action: DecisionAction,
    /// Replacement content; only meaningful for `Edit`
    #[serde(default)]
    pub edited_content: Option<String>,
    /// Free-form reviewer feedback; typically set for `Reject`
    #[serde(default)]
    pub feedback: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl HumanDecision {
    pub fn approve() -> Self {
        Self::now(DecisionAction::Approve)
    }

    pub fn edit(content: impl Into<String>) -> Self {
        let mut d = Self::now(DecisionAction::Edit);
        d.edited_content = Some(content.into());
        d
    }

    pub fn reject(feedback: Option<String>) -> Self {
        let mut d = Self::now(DecisionAction::Reject);
        d.feedback = feedback;
        d
    }

    pub fn summary_only() -> Self {
        Self::now(DecisionAction::SummaryOnly)
    }

    fn now(action: DecisionAction) -> Self {
        Self {
            action,
            edited_content: None,
            feedback: None,
            decided_at: Utc::now(),
        }
    }
}
