//! Review issues with severity, category, and mandatory evidence

use serde::{Deserialize, Serialize};

/// Issue severity, ordered from least to most severe so that
/// `Severity::Blocker > Severity::Major` holds under the derived ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Nit,
    Minor,
    Major,
    Blocker,
}

/// Display order for summaries: most severe first
pub const SEVERITY_ORDER: [Severity; 4] = [
    Severity::Blocker,
    Severity::Major,
    Severity::Minor,
    Severity::Nit,
];

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Nit => "nit",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Fixed issue category vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Correctness,
    Security,
    /// Accepts the short form "perf" used in generation output
    #[serde(alias = "perf")]
    Performance,
    Style,
    Test,
    Docs,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Correctness => "correctness",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Style => "style",
            Category::Test => "test",
            Category::Docs => "docs",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single issue found during review
///
/// Field names double as the schema for generation output, so they stay
/// stable even where a shorter Rust name would read better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: Severity,
    pub category: Category,
    pub file_path: String,
    pub line_number: u32,
    /// What is wrong and why it matters
    pub explanation: String,
    /// Actionable remediation, if the reviewer offered one
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Citations into the retrieval bundle; an issue without at least one
    /// reference is invalid and must never reach the approval gate
    #[serde(default)]
    pub evidence_references: Vec<String>,
}

impl ReviewIssue {
    /// Check structural invariants, returning the first violation as a
    /// human-readable reason. Used at the review-stage boundary and again
    /// by the guardrail engine.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.explanation.trim().is_empty() {
            return Err(format!(
                "issue at {}:{} has an empty explanation",
                self.file_path, self.line_number
            ));
        }
        if self.file_path.trim().is_empty() {
            return Err("issue has an empty file path".to_string());
        }
        if self.evidence_references.is_empty() {
            return Err(format!(
                "issue at {}:{} has no evidence references",
                self.file_path, self.line_number
            ));
        }
        if self.evidence_references.iter().any(|r| r.trim().is_empty()) {
            return Err(format!(
                "issue at {}:{} has a blank evidence reference",
                self.file_path, self.line_number
            ));
        }
        Ok(())
    }

    /// All searchable text carried by this issue
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.explanation.as_str())
            .chain(self.suggestion.as_deref())
    }
}
