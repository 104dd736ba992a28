//! Human-readable renderings of a review run
//!
//! Four views over the same state: the full review comment, the
//! condensed summary-only comment, the approval-gate prompt, and the
//! persisted run summary. All are pure functions of the state.

use crate::model::{WorkflowState, SEVERITY_ORDER};

/// Full review comment for publishing
pub fn review_comment(state: &WorkflowState) -> String {
    let mut lines = Vec::new();

    lines.push(format!("## Automated Review: {}", title_of(state)));
    lines.push(String::new());
    lines.push(format!(
        "Reviewed {} change(s) and found {} issue(s).",
        state.hunks.len(),
        state.issues.len()
    ));
    lines.push(String::new());

    if state.issues.is_empty() {
        lines.push("No issues found. The change looks good.".to_string());
    } else {
        lines.push("### Issues".to_string());
        for severity in SEVERITY_ORDER {
            let issues = state.issues_with_severity(severity);
            if issues.is_empty() {
                continue;
            }
            lines.push(String::new());
            lines.push(format!(
                "#### {} ({})",
                severity.label().to_uppercase(),
                issues.len()
            ));
            for (i, issue) in issues.iter().enumerate() {
                lines.push(String::new());
                lines.push(format!(
                    "{}. **[{}]** `{}:{}`",
                    i + 1,
                    issue.category,
                    issue.file_path,
                    issue.line_number
                ));
                lines.push(format!("   {}", issue.explanation));
                if let Some(suggestion) = &issue.suggestion {
                    lines.push(format!("   Suggestion: {}", suggestion));
                }
                if !issue.evidence_references.is_empty() {
                    lines.push(format!("   Evidence: {}", backticked(&issue.evidence_references)));
                }
            }
        }
    }

    if !state.fix_tasks.is_empty() {
        lines.push(String::new());
        lines.push("### Fix Plan".to_string());
        for (i, task) in state.fix_tasks.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("{}. **{}** [{}]", i + 1, task.title, task.effort_estimate));
            lines.push(format!("   Why: {}", task.why_it_matters));
            lines.push(format!("   Files: {}", task.affected_files.join(", ")));
            lines.push(format!("   Approach: {}", task.suggested_approach));
        }
    }

    lines.push(String::new());
    lines.push(format!("---\n_Run `{}`_", state.run_id));
    lines.join("\n")
}

/// Condensed comment without per-issue detail
pub fn condensed_summary(state: &WorkflowState) -> String {
    let mut lines = Vec::new();

    lines.push(format!("## Review Summary: {}", title_of(state)));
    lines.push(String::new());
    lines.push(format!(
        "Reviewed {} change(s) and found {} issue(s).",
        state.hunks.len(),
        state.issues.len()
    ));

    let counts = state.severity_counts();
    if !counts.is_empty() {
        lines.push(String::new());
        for (severity, count) in counts {
            lines.push(format!("- {}: {}", severity, count));
        }
    }

    if !state.fix_tasks.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "A fix plan with {} task(s) is available in the full review.",
            state.fix_tasks.len()
        ));
    }

    lines.push(String::new());
    lines.push(format!("---\n_Run `{}`_", state.run_id));
    lines.join("\n")
}

/// Text shown at the approval gate before asking for a decision
pub fn gate_prompt(state: &WorkflowState) -> String {
    let rule = "=".repeat(72);
    let thin = "-".repeat(72);
    let mut lines = Vec::new();

    lines.push(rule.clone());
    lines.push(format!("REVIEW SUMMARY - {}", title_of(state)));
    lines.push(rule.clone());
    lines.push(String::new());

    if let Some(guardrail) = &state.guardrail {
        if guardrail.pass {
            lines.push("Guardrail checks: PASSED".to_string());
        } else {
            lines.push("Guardrail checks: FAILED".to_string());
            lines.push(String::new());
            lines.push("Blocking reasons:".to_string());
            for reason in &guardrail.blocking_reasons {
                lines.push(format!("  - {}", reason));
            }
        }
        if !guardrail.warnings.is_empty() {
            lines.push(String::new());
            lines.push("Warnings:".to_string());
            for warning in &guardrail.warnings {
                lines.push(format!("  ! {}", warning));
            }
        }
        lines.push(String::new());
    }

    let retrieved: usize = state.bundles.iter().map(|b| b.retrieved_count()).sum();
    lines.push(format!(
        "Evidence: {} snippet(s) retrieved, {} after fusion",
        retrieved,
        state.fused_evidence_count()
    ));
    lines.push(String::new());

    lines.push(format!("REVIEW ISSUES ({} total)", state.issues.len()));
    lines.push(thin.clone());
    if state.issues.is_empty() {
        lines.push("No issues found.".to_string());
    } else {
        for severity in SEVERITY_ORDER {
            let issues = state.issues_with_severity(severity);
            if issues.is_empty() {
                continue;
            }
            lines.push(String::new());
            lines.push(format!(
                "{} ({}):",
                severity.label().to_uppercase(),
                issues.len()
            ));
            for (i, issue) in issues.iter().enumerate() {
                lines.push(format!(
                    "  {}. [{}] {}:{}",
                    i + 1,
                    issue.category,
                    issue.file_path,
                    issue.line_number
                ));
                lines.push(format!("     {}", issue.explanation));
                if let Some(suggestion) = &issue.suggestion {
                    lines.push(format!("     Suggestion: {}", suggestion));
                }
                let refs: Vec<&str> = issue
                    .evidence_references
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                if !refs.is_empty() {
                    lines.push(format!("     Evidence: {}", refs.join(", ")));
                }
            }
        }
    }

    lines.push(String::new());
    lines.push(format!("FIX PLAN ({} tasks)", state.fix_tasks.len()));
    lines.push(thin);
    if state.fix_tasks.is_empty() {
        lines.push("No fix tasks generated.".to_string());
    } else {
        for (i, task) in state.fix_tasks.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("{}. {} [{}]", i + 1, task.title, task.effort_estimate));
            lines.push(format!("   Why: {}", task.why_it_matters));
            lines.push(format!("   Files: {}", task.affected_files.join(", ")));
            lines.push(format!("   Approach: {}", task.suggested_approach));
        }
    }

    lines.push(String::new());
    lines.push(rule);
    lines.join("\n")
}

/// Markdown run summary written next to the persisted state
pub fn run_summary(state: &WorkflowState) -> String {
    let mut lines = Vec::new();

    lines.push("# Review Run Summary".to_string());
    lines.push(String::new());
    lines.push(format!("**Run ID**: {}", state.run_id));
    lines.push(format!("**Repository**: {}", state.repo_slug()));
    if let Some(number) = state.pr_number {
        lines.push(format!("**PR Number**: #{}", number));
    }
    lines.push(format!("**Started**: {}", state.started_at.to_rfc3339()));
    if let Some(sha) = &state.pr_sha {
        lines.push(format!("**Head SHA**: {}", sha));
    }
    if let Some(sha) = &state.base_sha {
        lines.push(format!("**Base SHA**: {}", sha));
    }
    lines.push(format!("**Final stage**: {}", state.stage));
    lines.push(String::new());

    lines.push(format!("## Hunks Processed: {}", state.hunks.len()));
    lines.push(String::new());

    lines.push("## Retrieval".to_string());
    lines.push(String::new());
    let with_context = state.bundles.iter().filter(|b| !b.is_empty()).count();
    let retrieved: usize = state.bundles.iter().map(|b| b.retrieved_count()).sum();
    lines.push(format!("- Hunks with context: {}", with_context));
    lines.push(format!("- Evidence retrieved: {}", retrieved));
    lines.push(format!("- Evidence after fusion: {}", state.fused_evidence_count()));
    lines.push(String::new());

    lines.push(format!("## Review Issues: {}", state.issues.len()));
    lines.push(String::new());
    for (severity, count) in state.severity_counts() {
        lines.push(format!("- {}: {}", severity, count));
    }
    if !state.issues.is_empty() {
        lines.push(String::new());
    }

    lines.push(format!("## Fix Tasks: {}", state.fix_tasks.len()));
    lines.push(String::new());
    for task in &state.fix_tasks {
        lines.push(format!("- {} [{}]", task.title, task.effort_estimate));
    }
    if !state.fix_tasks.is_empty() {
        lines.push(String::new());
    }

    if let Some(guardrail) = &state.guardrail {
        lines.push("## Guardrail Checks".to_string());
        lines.push(String::new());
        lines.push(format!(
            "- **Status**: {}",
            if guardrail.pass { "PASSED" } else { "FAILED" }
        ));
        lines.push(format!("- **Checks**: {}", guardrail.checks_performed.join(", ")));
        if !guardrail.blocking_reasons.is_empty() {
            lines.push(format!("- **Blocking**: {} reason(s)", guardrail.blocking_reasons.len()));
        }
        if !guardrail.warnings.is_empty() {
            lines.push(format!("- **Warnings**: {}", guardrail.warnings.len()));
        }
        lines.push(String::new());
    }

    if let Some(decision) = &state.decision {
        lines.push("## Human Decision".to_string());
        lines.push(String::new());
        lines.push(format!("- **Action**: {}", decision.action));
        if let Some(feedback) = &decision.feedback {
            lines.push(format!("- **Feedback**: {}", feedback));
        }
        lines.push(format!("- **Decided at**: {}", decision.decided_at.to_rfc3339()));
        lines.push(String::new());
    }

    if let Some(url) = &state.posted_comment_url {
        lines.push("## Published".to_string());
        lines.push(String::new());
        lines.push(format!("- **Comment URL**: {}", url));
        lines.push(format!("- **Notification sent**: {}", state.notification_sent));
        lines.push(String::new());
    }

    if !state.errors.is_empty() {
        lines.push(format!("## Errors ({})", state.errors.len()));
        lines.push(String::new());
        for error in &state.errors {
            lines.push(format!("- {}", error));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn title_of(state: &WorkflowState) -> String {
    match state.pr_number {
        Some(number) => format!("{} #{}", state.repo_slug(), number),
        None => state.repo_slug(),
    }
}

fn backticked(refs: &[String]) -> String {
    refs.iter()
        .map(|r| format!("`{}`", r))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Category, EffortTier, FixTask, GuardrailResult, HumanDecision, ReviewIssue, Severity,
    };

    fn issue(severity: Severity, file: &str) -> ReviewIssue {
        ReviewIssue {
            severity,
            category: Category::Security,
            file_path: file.to_string(),
            line_number: 12,
            explanation: "Credential committed in plain text".to_string(),
            suggestion: Some("Load it from the environment".to_string()),
            evidence_references: vec!["[CONVENTION: Secrets]".to_string()],
        }
    }

    fn populated_state() -> WorkflowState {
        let mut state = WorkflowState::new("octo", "widgets").with_pr(7, "abc123");
        state.issues = vec![
            issue(Severity::Blocker, "src/auth.rs"),
            issue(Severity::Minor, "src/log.rs"),
        ];
        state.fix_tasks = vec![FixTask {
            task_id: "task_1".to_string(),
            title: "Remove committed credential".to_string(),
            why_it_matters: "Leaked secrets require rotation".to_string(),
            affected_files: vec!["src/auth.rs".to_string()],
            suggested_approach: "Move to environment configuration".to_string(),
            effort_estimate: EffortTier::S,
            related_issues: vec![0],
        }];
        state
    }

    #[test]
    fn test_review_comment_groups_by_severity() {
        let comment = review_comment(&populated_state());
        assert!(comment.contains("## Automated Review: octo/widgets #7"));
        assert!(comment.contains("#### BLOCKER (1)"));
        assert!(comment.contains("#### MINOR (1)"));
        assert!(comment.contains("`src/auth.rs:12`"));
        assert!(comment.contains("### Fix Plan"));
        assert!(comment.contains("Remove committed credential"));
        // Blockers render before minors
        let blocker_at = comment.find("BLOCKER").unwrap();
        let minor_at = comment.find("MINOR").unwrap();
        assert!(blocker_at < minor_at);
    }

    #[test]
    fn test_review_comment_no_issues() {
        let state = WorkflowState::new("octo", "widgets");
        let comment = review_comment(&state);
        assert!(comment.contains("No issues found"));
        assert!(!comment.contains("### Issues"));
    }

    #[test]
    fn test_condensed_summary_omits_detail() {
        let summary = condensed_summary(&populated_state());
        assert!(summary.contains("found 2 issue(s)"));
        assert!(summary.contains("- blocker: 1"));
        assert!(!summary.contains("Credential committed"));
        assert!(!summary.contains("src/auth.rs"));
    }

    #[test]
    fn test_gate_prompt_shows_guardrail_failure() {
        let mut state = populated_state();
        state.guardrail = Some(GuardrailResult::from_checks(
            vec!["potential secret detected: hardcoded password".to_string()],
            vec!["odd phrasing in evidence".to_string()],
            vec!["secret_scanning".to_string()],
        ));

        let prompt = gate_prompt(&state);
        assert!(prompt.contains("Guardrail checks: FAILED"));
        assert!(prompt.contains("potential secret detected"));
        assert!(prompt.contains("! odd phrasing in evidence"));
        assert!(prompt.contains("REVIEW ISSUES (2 total)"));
        assert!(prompt.contains("FIX PLAN (1 tasks)"));
    }

    #[test]
    fn test_gate_prompt_passed_guardrail() {
        let mut state = populated_state();
        state.guardrail = Some(GuardrailResult::from_checks(vec![], vec![], vec![]));
        let prompt = gate_prompt(&state);
        assert!(prompt.contains("Guardrail checks: PASSED"));
        assert!(prompt.contains("Evidence: 0 snippet(s) retrieved, 0 after fusion"));
    }

    #[test]
    fn test_run_summary_sections() {
        let mut state = populated_state();
        state.guardrail = Some(GuardrailResult::from_checks(
            vec![],
            vec![],
            vec!["schema_validation".to_string()],
        ));
        state.decision = Some(HumanDecision::reject(Some("too noisy".to_string())));
        state.record_error("retrieval", "index down");

        let summary = run_summary(&state);
        assert!(summary.contains("**Run ID**: run-"));
        assert!(summary.contains("**Repository**: octo/widgets"));
        assert!(summary.contains("## Review Issues: 2"));
        assert!(summary.contains("- blocker: 1"));
        assert!(summary.contains("- **Status**: PASSED"));
        assert!(summary.contains("- **Action**: reject"));
        assert!(summary.contains("- **Feedback**: too noisy"));
        assert!(summary.contains("## Errors (1)"));
    }
}
