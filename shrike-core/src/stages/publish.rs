//! Review publication
//!
//! The human decision picks the comment body: approvals publish the full
//! generated review, edits publish the replacement text, summary-only
//! publishes the condensed form. Runs without a publisher or without a
//! pull request skip posting without treating it as a failure.

use std::sync::Arc;

use tracing::info;

use crate::model::{DecisionAction, HumanDecision, WorkflowState};
use crate::render;
use crate::services::Publisher;
use crate::Result;

pub struct PublishStage {
    publisher: Option<Arc<dyn Publisher>>,
}

impl PublishStage {
    pub fn new(publisher: Option<Arc<dyn Publisher>>) -> Self {
        Self { publisher }
    }

    /// Post the review as directed by the decision
    ///
    /// Returns the comment URL when a comment was actually posted.
    pub async fn run(
        &self,
        state: &WorkflowState,
        decision: &HumanDecision,
    ) -> Result<Option<String>> {
        if !decision.action.publishes() {
            return Ok(None);
        }

        let Some(publisher) = &self.publisher else {
            info!("No publisher configured, skipping comment");
            return Ok(None);
        };
        let Some(pr_number) = state.pr_number else {
            info!("Run has no pull request, skipping comment");
            return Ok(None);
        };

        let body = comment_body(state, decision);
        let url = publisher
            .post_comment(&state.repo_owner, &state.repo_name, pr_number, &body)
            .await?;
        info!(url = %url, action = %decision.action, "Review comment posted");
        Ok(Some(url))
    }
}

/// Choose the comment body for the decision
///
/// An edit without replacement text falls back to the generated review.
pub(crate) fn comment_body(state: &WorkflowState, decision: &HumanDecision) -> String {
    match decision.action {
        DecisionAction::Edit => match decision.edited_content.as_deref() {
            Some(content) if !content.trim().is_empty() => content.to_string(),
            _ => render::review_comment(state),
        },
        DecisionAction::SummaryOnly => render::condensed_summary(state),
        _ => render::review_comment(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::model::{Category, ReviewIssue, Severity};
    use crate::Error;

    #[derive(Default)]
    struct RecordingPublisher {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn post_comment(
            &self,
            owner: &str,
            repo: &str,
            pr_number: u64,
            body: &str,
        ) -> Result<String> {
            self.bodies.lock().unwrap().push(body.to_string());
            Ok(format!(
                "https://example.com/{}/{}/pull/{}#issuecomment-1",
                owner, repo, pr_number
            ))
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn post_comment(&self, _: &str, _: &str, _: u64, _: &str) -> Result<String> {
            Err(Error::Publish("comment API returned 403".to_string()))
        }
    }

    fn state() -> WorkflowState {
        let mut state = WorkflowState::new("octo", "widgets").with_pr(7, "abc123");
        state.issues = vec![ReviewIssue {
            severity: Severity::Major,
            category: Category::Correctness,
            file_path: "src/a.rs".to_string(),
            line_number: 3,
            explanation: "Wrong bound".to_string(),
            suggestion: None,
            evidence_references: vec!["[src/a.rs:1-4]".to_string()],
        }];
        state
    }

    #[tokio::test]
    async fn test_approve_posts_full_review() {
        let publisher = Arc::new(RecordingPublisher::default());
        let stage = PublishStage::new(Some(publisher.clone()));

        let url = stage
            .run(&state(), &HumanDecision::approve())
            .await
            .unwrap();
        assert!(url.unwrap().contains("issuecomment"));

        let bodies = publisher.bodies.lock().unwrap();
        assert!(bodies[0].contains("## Automated Review"));
        assert!(bodies[0].contains("Wrong bound"));
    }

    #[tokio::test]
    async fn test_edit_posts_replacement_text() {
        let publisher = Arc::new(RecordingPublisher::default());
        let stage = PublishStage::new(Some(publisher.clone()));

        stage
            .run(&state(), &HumanDecision::edit("My own wording."))
            .await
            .unwrap();

        let bodies = publisher.bodies.lock().unwrap();
        assert_eq!(bodies[0], "My own wording.");
    }

    #[tokio::test]
    async fn test_blank_edit_falls_back_to_generated() {
        let publisher = Arc::new(RecordingPublisher::default());
        let stage = PublishStage::new(Some(publisher.clone()));

        stage.run(&state(), &HumanDecision::edit("  ")).await.unwrap();

        let bodies = publisher.bodies.lock().unwrap();
        assert!(bodies[0].contains("## Automated Review"));
    }

    #[tokio::test]
    async fn test_summary_only_posts_condensed() {
        let publisher = Arc::new(RecordingPublisher::default());
        let stage = PublishStage::new(Some(publisher.clone()));

        stage
            .run(&state(), &HumanDecision::summary_only())
            .await
            .unwrap();

        let bodies = publisher.bodies.lock().unwrap();
        assert!(bodies[0].contains("## Review Summary"));
        assert!(!bodies[0].contains("Wrong bound"));
    }

    #[tokio::test]
    async fn test_reject_never_posts() {
        let publisher = Arc::new(RecordingPublisher::default());
        let stage = PublishStage::new(Some(publisher.clone()));

        let url = stage
            .run(&state(), &HumanDecision::reject(None))
            .await
            .unwrap();
        assert!(url.is_none());
        assert!(publisher.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_publisher_skips() {
        let stage = PublishStage::new(None);
        let url = stage
            .run(&state(), &HumanDecision::approve())
            .await
            .unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn test_local_run_skips() {
        let stage = PublishStage::new(Some(Arc::new(RecordingPublisher::default())));
        let local = WorkflowState::new("octo", "widgets");
        let url = stage.run(&local, &HumanDecision::approve()).await.unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn test_publish_error_propagates() {
        let stage = PublishStage::new(Some(Arc::new(FailingPublisher)));
        let result = stage.run(&state(), &HumanDecision::approve()).await;
        assert!(result.is_err());
    }
}
