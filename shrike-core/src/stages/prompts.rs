//! Stage prompt templates
//!
//! This module provides the embedded prompt templates for the generation
//! stages. Templates use `{{VARIABLE}}` placeholders that are rendered
//! with a [`PromptContext`].

use std::collections::HashMap;

use crate::model::{Evidence, Hunk, RetrievalBundle, ReviewIssue};

const REVIEW_PROMPT: &str = include_str!("prompts/review.md");
const PLAN_PROMPT: &str = include_str!("prompts/plan.md");

/// Which generation prompt to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Per-hunk issue identification
    Review,
    /// Fix-plan synthesis over the full issue list
    Plan,
}

/// Get the raw template for a prompt kind
pub fn template(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Review => REVIEW_PROMPT,
        PromptKind::Plan => PLAN_PROMPT,
    }
}

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Fill the code-change section from a hunk
    pub fn with_hunk(self, hunk: &Hunk) -> Self {
        let (old_start, old_end) = hunk.old_range();
        let (new_start, new_end) = hunk.new_range();
        self.with("FILE_PATH", &hunk.file_path)
            .with("OLD_RANGE", format!("{}-{}", old_start, old_end))
            .with("NEW_RANGE", format!("{}-{}", new_start, new_end))
            .with(
                "REMOVED_LINES",
                line_block(hunk.removed().map(|l| l.content.as_str())),
            )
            .with(
                "ADDED_LINES",
                line_block(hunk.added().map(|l| l.content.as_str())),
            )
            .with(
                "CONTEXT_LINES",
                line_block(hunk.context().map(|l| l.content.as_str())),
            )
    }

    /// Fill the evidence sections from a retrieval bundle
    pub fn with_bundle(self, bundle: &RetrievalBundle) -> Self {
        self.with("LOCAL_CONTEXT", evidence_section(&bundle.local_context))
            .with("SIMILAR_CODE", evidence_section(&bundle.similar_code))
            .with("CONVENTIONS", evidence_section(&bundle.conventions))
    }

    /// Fill the issue listing for the planning prompt
    pub fn with_issues(self, issues: &[ReviewIssue]) -> Self {
        self.with("ISSUES", issue_listing(issues))
    }
}

/// Render a prompt template with the given context
pub fn render(kind: PromptKind, context: &PromptContext) -> String {
    render_template(template(kind), context)
}

fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = template.to_string();

    for (key, value) in &context.variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    // Replace any placeholder left unset with "(not specified)"
    loop {
        let start = result.find("{{");
        let end = result.find("}}");

        match (start, end) {
            (Some(s), Some(e)) if s < e => {
                let placeholder = &result[s..=e + 1];
                let inside = &result[s + 2..e];
                if inside.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
                    result = result.replacen(placeholder, "(not specified)", 1);
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    result
}

fn line_block<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let joined = lines.collect::<Vec<_>>().join("\n");
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

/// Format evidence items with their citation source, so the model can
/// copy references verbatim
fn evidence_section(items: &[Evidence]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|e| {
            format!(
                "Source: {}\n```\n{}\n```",
                e.citation(),
                e.content.trim_end()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Number issues from zero so `related_issues` indices line up
fn issue_listing(issues: &[ReviewIssue]) -> String {
    let mut lines = Vec::new();
    for (i, issue) in issues.iter().enumerate() {
        lines.push(format!(
            "{}. [{}] {}",
            i,
            issue.severity.label().to_uppercase(),
            issue.category
        ));
        lines.push(format!("   File: {}:{}", issue.file_path, issue.line_number));
        lines.push(format!("   Issue: {}", issue.explanation));
        if let Some(suggestion) = &issue.suggestion {
            lines.push(format!("   Suggestion: {}", suggestion));
        }
        if !issue.evidence_references.is_empty() {
            lines.push(format!(
                "   Evidence: {}",
                issue.evidence_references.join(", ")
            ));
        }
    }
    lines.join("\n")
}
