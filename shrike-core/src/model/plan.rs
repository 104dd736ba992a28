//! Fix tasks grouping review issues into actionable work

use serde::{Deserialize, Serialize};

/// Effort tier for a fix task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffortTier {
    /// Small, under an hour
    S,
    /// Medium, one to four hours
    M,
    /// Large, more than four hours
    L,
}

impl EffortTier {
    /// Infer a tier from how many issues a task bundles:
    /// one issue is small, two to four medium, five or more large.
    pub fn from_issue_count(count: usize) -> Self {
        match count {
            0 | 1 => EffortTier::S,
            2..=4 => EffortTier::M,
            _ => EffortTier::L,
        }
    }
}

impl std::fmt::Display for EffortTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EffortTier::S => "S",
            EffortTier::M => "M",
            EffortTier::L => "L",
        };
        write!(f, "{}", s)
    }
}

/// A grouping of related issues into one unit of remediation work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixTask {
    pub task_id: String,
    pub title: String,
    /// Impact on quality/security/performance if left unfixed
    pub why_it_matters: String,
    pub affected_files: Vec<String>,
    pub suggested_approach: String,
    pub effort_estimate: EffortTier,
    /// Zero-based indices into the run's issue list
    #[serde(default)]
    pub related_issues: Vec<usize>,
}

impl FixTask {
    /// Check structural invariants against the run's issue count
    pub fn validate(&self, issue_count: usize) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!("task {} has an empty title", self.task_id));
        }
        if self.affected_files.is_empty() {
            return Err(format!("task {} lists no affected files", self.task_id));
        }
        if let Some(&idx) = self.related_issues.iter().find(|&&i| i >= issue_count) {
            return Err(format!(
                "task {} references issue index {} but only {} issues exist",
                self.task_id, idx, issue_count
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> FixTask {
        FixTask {
            task_id: "task_1".to_string(),
            title: "Add error handling for missing keys".to_string(),
            why_it_matters: "Prevents runtime panics".to_string(),
            affected_files: vec!["src/app.rs".to_string()],
            suggested_approach: "Use get() with defaults".to_string(),
            effort_estimate: EffortTier::S,
            related_issues: vec![0, 1],
        }
    }

    #[test]
    fn test_effort_from_count() {
        assert_eq!(EffortTier::from_issue_count(1), EffortTier::S);
        assert_eq!(EffortTier::from_issue_count(2), EffortTier::M);
        assert_eq!(EffortTier::from_issue_count(4), EffortTier::M);
        assert_eq!(EffortTier::from_issue_count(5), EffortTier::L);
        assert_eq!(EffortTier::from_issue_count(12), EffortTier::L);
    }

    #[test]
    fn test_effort_serde_uses_bare_letters() {
        assert_eq!(serde_json::to_string(&EffortTier::M).unwrap(), "\"M\"");
        let tier: EffortTier = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(tier, EffortTier::L);
    }

    #[test]
    fn test_valid_task() {
        assert!(task().validate(3).is_ok());
    }

    #[test]
    fn test_task_with_out_of_range_index_rejected() {
        let reason = task().validate(1).unwrap_err();
        assert!(reason.contains("references issue index 1"));
    }

    #[test]
    fn test_task_without_files_rejected() {
        let mut bad = task();
        bad.affected_files.clear();
        assert!(bad.validate(3).is_err());
    }
}
