//! Fix-plan synthesis: group review issues into actionable tasks
//!
//! The model gets one shot at grouping. If its output cannot be parsed
//! or yields no valid task, a deterministic fallback groups issues by
//! severity and file so the run always carries a plan when issues exist.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::extract_json;
use crate::model::{EffortTier, FixTask, ReviewIssue, Severity};
use crate::services::Generator;
use crate::stages::prompts::{render, PromptContext, PromptKind};
use crate::{Error, Result};

/// Tasks plus any degradation hit while producing them
#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub tasks: Vec<FixTask>,
    pub errors: Vec<String>,
}

/// Runs the fix-plan prompt over the full issue list
pub struct PlanStage {
    generator: Arc<dyn Generator>,
}

impl PlanStage {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Build a fix plan; empty issues yield an empty plan
    pub async fn run(&self, issues: &[ReviewIssue]) -> PlanOutcome {
        let mut outcome = PlanOutcome::default();
        if issues.is_empty() {
            info!("No issues, skipping fix plan");
            return outcome;
        }

        let context = PromptContext::new().with_issues(issues);
        let prompt = render(PromptKind::Plan, &context);

        let tasks = match self.generator.generate(&prompt).await {
            Ok(response) => match parse_tasks(&response, issues.len()) {
                Ok(tasks) if !tasks.is_empty() => tasks,
                Ok(_) => {
                    warn!("Plan output contained no valid task, using fallback grouping");
                    fallback_plan(issues)
                }
                Err(e) => {
                    outcome.errors.push(format!("fix planning failed: {}", e));
                    fallback_plan(issues)
                }
            },
            Err(e) => {
                outcome.errors.push(format!("fix planning failed: {}", e));
                fallback_plan(issues)
            }
        };

        info!(tasks = tasks.len(), "Fix plan ready");
        outcome.tasks = tasks;
        outcome
    }
}

/// Parse model output into validated tasks
pub(crate) fn parse_tasks(response: &str, issue_count: usize) -> Result<Vec<FixTask>> {
    let json = extract_json(response)
        .ok_or_else(|| Error::Generation("no JSON found in plan output".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        _ => {
            return Err(Error::Generation(
                "plan output is not a JSON array".to_string(),
            ))
        }
    };

    let mut tasks = Vec::new();
    for item in items {
        let task: FixTask = match serde_json::from_value(item) {
            Ok(task) => task,
            Err(e) => {
                debug!(error = %e, "Skipping malformed task");
                continue;
            }
        };
        if let Err(reason) = task.validate(issue_count) {
            debug!(reason = %reason, "Skipping invalid task");
            continue;
        }
        tasks.push(task);
    }
    Ok(tasks)
}

/// Deterministic grouping by (severity, file), preserving first-seen order
pub(crate) fn fallback_plan(issues: &[ReviewIssue]) -> Vec<FixTask> {
    let mut groups: Vec<((Severity, String), Vec<usize>)> = Vec::new();
    for (i, issue) in issues.iter().enumerate() {
        let key = (issue.severity, issue.file_path.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, indices)) => indices.push(i),
            None => groups.push((key, vec![i])),
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(n, ((severity, file_path), indices))| {
            let categories: BTreeSet<&str> = indices
                .iter()
                .map(|&i| issues[i].category.label())
                .collect();
            let count = indices.len();
            FixTask {
                task_id: format!("task_{}", n + 1),
                title: format!("Fix {} issues in {}", severity, file_path),
                why_it_matters: format!(
                    "Resolve {} {} issue(s) ({})",
                    count,
                    severity,
                    categories.into_iter().collect::<Vec<_>>().join(", ")
                ),
                affected_files: vec![file_path],
                suggested_approach: format!("Address the {} flagged issue(s) in this file", count),
                effort_estimate: EffortTier::from_issue_count(count),
                related_issues: indices,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::model::Category;

    struct CannedGenerator {
        response: String,
    }

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn issue(severity: Severity, category: Category, file: &str) -> ReviewIssue {
        ReviewIssue {
            severity,
            category,
            file_path: file.to_string(),
            line_number: 1,
            explanation: "problem".to_string(),
            suggestion: None,
            evidence_references: vec!["[a.rs:1]".to_string()],
        }
    }

    #[test]
    fn test_parse_valid_tasks() {
        let json = r#"[{
            "task_id": "task_1",
            "title": "Harden input handling",
            "why_it_matters": "Prevents crashes on malformed input",
            "affected_files": ["src/a.rs"],
            "suggested_approach": "Validate before use",
            "effort_estimate": "M",
            "related_issues": [0, 1]
        }]"#;
        let tasks = parse_tasks(json, 2).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].effort_estimate, EffortTier::M);
    }

    #[test]
    fn test_parse_rejects_out_of_range_indices() {
        let json = r#"[{
            "task_id": "task_1",
            "title": "Harden input handling",
            "why_it_matters": "Prevents crashes",
            "affected_files": ["src/a.rs"],
            "suggested_approach": "Validate before use",
            "effort_estimate": "S",
            "related_issues": [7]
        }]"#;
        // Only 2 issues exist, so index 7 invalidates the task
        assert!(parse_tasks(json, 2).unwrap().is_empty());
    }

    #[test]
    fn test_fallback_groups_by_severity_and_file() {
        let issues = vec![
            issue(Severity::Major, Category::Correctness, "src/a.rs"),
            issue(Severity::Major, Category::Security, "src/a.rs"),
            issue(Severity::Minor, Category::Style, "src/a.rs"),
            issue(Severity::Major, Category::Correctness, "src/b.rs"),
        ];

        let tasks = fallback_plan(&issues);
        assert_eq!(tasks.len(), 3);

        assert_eq!(tasks[0].title, "Fix major issues in src/a.rs");
        assert_eq!(tasks[0].related_issues, vec![0, 1]);
        assert_eq!(tasks[0].effort_estimate, EffortTier::M);
        assert!(tasks[0].why_it_matters.contains("correctness, security"));

        assert_eq!(tasks[1].title, "Fix minor issues in src/a.rs");
        assert_eq!(tasks[1].related_issues, vec![2]);
        assert_eq!(tasks[1].effort_estimate, EffortTier::S);

        assert_eq!(tasks[2].title, "Fix major issues in src/b.rs");
        assert_eq!(tasks[2].related_issues, vec![3]);
    }

    #[test]
    fn test_fallback_every_issue_covered_exactly_once() {
        let issues = vec![
            issue(Severity::Blocker, Category::Security, "src/a.rs"),
            issue(Severity::Nit, Category::Docs, "src/b.rs"),
            issue(Severity::Blocker, Category::Security, "src/a.rs"),
        ];
        let tasks = fallback_plan(&issues);

        let mut covered: Vec<usize> = tasks.iter().flat_map(|t| t.related_issues.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_issues_empty_plan() {
        let stage = PlanStage::new(Arc::new(CannedGenerator {
            response: "[]".to_string(),
        }));
        let outcome = stage.run(&[]).await;
        assert!(outcome.tasks.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back() {
        let stage = PlanStage::new(Arc::new(CannedGenerator {
            response: "I would group these by theme.".to_string(),
        }));
        let issues = vec![
            issue(Severity::Major, Category::Correctness, "src/a.rs"),
            issue(Severity::Major, Category::Correctness, "src/a.rs"),
        ];

        let outcome = stage.run(&issues).await;
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.tasks[0].title, "Fix major issues in src/a.rs");
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_model_tasks_used_when_valid() {
        let stage = PlanStage::new(Arc::new(CannedGenerator {
            response: r#"[{
                "task_id": "task_1",
                "title": "Tighten error handling",
                "why_it_matters": "Stops silent failures",
                "affected_files": ["src/a.rs"],
                "suggested_approach": "Propagate errors",
                "effort_estimate": "S",
                "related_issues": [0]
            }]"#
            .to_string(),
        }));
        let issues = vec![issue(Severity::Major, Category::Correctness, "src/a.rs")];

        let outcome = stage.run(&issues).await;
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.tasks[0].title, "Tighten error handling");
        assert!(outcome.errors.is_empty());
    }
}
