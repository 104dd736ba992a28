//! Review generation: one model call per hunk, parsed into issues
//!
//! Issues come back as JSON. Anything that fails to parse or validate is
//! dropped individually; a response with no usable JSON at all counts as
//! a degradation for the run's error log but contributes zero issues.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::extract_json;
use crate::model::{Hunk, RetrievalBundle, ReviewIssue};
use crate::services::Generator;
use crate::stages::prompts::{render, PromptContext, PromptKind};
use crate::{Error, Result};

/// Issues found across all hunks plus per-hunk failures
#[derive(Debug, Default)]
pub struct ReviewOutcome {
    pub issues: Vec<ReviewIssue>,
    pub errors: Vec<String>,
}

/// Runs the per-hunk review prompts
pub struct ReviewStage {
    generator: Arc<dyn Generator>,
}

impl ReviewStage {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Review every hunk against its evidence bundle
    ///
    /// Bundles are matched by `hunk_index`. A hunk whose review fails
    /// contributes no issues; the failure is recorded, never propagated.
    pub async fn run(&self, hunks: &[Hunk], bundles: &[RetrievalBundle]) -> ReviewOutcome {
        let mut outcome = ReviewOutcome::default();
        info!(hunks = hunks.len(), "Reviewing hunks");

        for (index, hunk) in hunks.iter().enumerate() {
            let Some(bundle) = bundles.iter().find(|b| b.hunk_index == index) else {
                warn!(hunk = index, file = %hunk.file_path, "No evidence bundle, skipping hunk");
                continue;
            };

            match self.review_hunk(hunk, bundle).await {
                Ok(issues) => {
                    debug!(hunk = index, found = issues.len(), "Hunk reviewed");
                    outcome.issues.extend(issues);
                }
                Err(e) => {
                    outcome.errors.push(format!(
                        "review failed for {}:{}: {}",
                        hunk.file_path, hunk.new_start, e
                    ));
                }
            }
        }

        info!(issues = outcome.issues.len(), "Review complete");
        outcome
    }

    async fn review_hunk(&self, hunk: &Hunk, bundle: &RetrievalBundle) -> Result<Vec<ReviewIssue>> {
        let context = PromptContext::new().with_hunk(hunk).with_bundle(bundle);
        let prompt = render(PromptKind::Review, &context);
        let response = self.generator.generate(&prompt).await?;
        parse_issues(&response)
    }
}

/// Parse model output into validated issues
///
/// Accepts a JSON array or a single object. Individual items that fail
/// to deserialize or validate are skipped; an issue without evidence
/// references is always skipped.
pub(crate) fn parse_issues(response: &str) -> Result<Vec<ReviewIssue>> {
    let json = extract_json(response)
        .ok_or_else(|| Error::Generation("no JSON found in review output".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        other => {
            return Err(Error::Generation(format!(
                "review output is {} where an array was expected",
                json_kind(&other)
            )))
        }
    };

    let mut issues = Vec::new();
    for item in items {
        let issue: ReviewIssue = match serde_json::from_value(item) {
            Ok(issue) => issue,
            Err(e) => {
                debug!(error = %e, "Skipping malformed issue");
                continue;
            }
        };
        if issue.evidence_references.iter().all(|r| r.trim().is_empty()) {
            warn!(
                file = %issue.file_path,
                line = issue.line_number,
                "Dropping issue without evidence references"
            );
            continue;
        }
        if let Err(reason) = issue.validate() {
            debug!(reason = %reason, "Skipping invalid issue");
            continue;
        }
        issues.push(issue);
    }
    Ok(issues)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
