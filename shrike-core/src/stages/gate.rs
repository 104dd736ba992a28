//! Human approval gate
//!
//! The workflow never reads input itself. It sends a [`DecisionRequest`]
//! over a channel to whatever front end drives the run and waits for the
//! response. Every breakdown on that path (closed channel, dropped
//! responder, expired timeout) resolves to a rejection, so a review can
//! only publish with an explicit decision in hand.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::model::{HumanDecision, WorkflowState};
use crate::render;

/// What the front end shows before asking for a decision
#[derive(Debug, Clone)]
pub struct DecisionPrompt {
    pub run_id: String,
    /// Rendered review summary for display
    pub summary: String,
    /// The comment body as it would be posted; edit flows start from this
    pub draft_comment: String,
    pub issue_count: usize,
    pub task_count: usize,
    pub guardrail_passed: bool,
    pub blocking_reasons: Vec<String>,
}

/// A prompt paired with the channel to answer it on
#[derive(Debug)]
pub struct DecisionRequest {
    pub prompt: DecisionPrompt,
    pub respond: oneshot::Sender<HumanDecision>,
}

#[derive(Clone)]
enum GateMode {
    /// Forward prompts to an external decision loop
    Channel(mpsc::Sender<DecisionRequest>),
    /// Approve everything without asking (non-interactive runs)
    AutoApprove,
}

/// Collects the human decision for a run
#[derive(Clone)]
pub struct HumanGate {
    mode: GateMode,
    timeout: Option<Duration>,
}

impl HumanGate {
    /// Gate wired to an external decision loop
    ///
    /// The receiver end belongs to the front end: a terminal prompt, a
    /// web handler, or a test harness.
    pub fn channel() -> (Self, mpsc::Receiver<DecisionRequest>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                mode: GateMode::Channel(tx),
                timeout: None,
            },
            rx,
        )
    }

    pub fn auto_approve() -> Self {
        Self {
            mode: GateMode::AutoApprove,
            timeout: None,
        }
    }

    /// Cap the wait for a decision; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask for a decision, failing closed to rejection on any breakdown
    pub async fn decide(&self, state: &WorkflowState) -> HumanDecision {
        let sender = match &self.mode {
            GateMode::AutoApprove => {
                info!(run_id = %state.run_id, "Auto-approving without human input");
                let mut decision = HumanDecision::approve();
                decision.feedback = Some("approved automatically".to_string());
                return decision;
            }
            GateMode::Channel(sender) => sender.clone(),
        };

        let (respond, response) = oneshot::channel();
        let prompt = DecisionPrompt {
            run_id: state.run_id.clone(),
            summary: render::gate_prompt(state),
            draft_comment: render::review_comment(state),
            issue_count: state.issues.len(),
            task_count: state.fix_tasks.len(),
            guardrail_passed: state.guardrail.as_ref().map(|g| g.pass).unwrap_or(true),
            blocking_reasons: state
                .guardrail
                .as_ref()
                .map(|g| g.blocking_reasons.clone())
                .unwrap_or_default(),
        };

        if sender
            .send(DecisionRequest { prompt, respond })
            .await
            .is_err()
        {
            warn!(run_id = %state.run_id, "Decision channel closed, rejecting");
            return HumanDecision::reject(Some("approval channel closed".to_string()));
        }

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(run_id = %state.run_id, limit = ?limit, "Decision timed out, rejecting");
                    return HumanDecision::reject(Some(format!(
                        "no decision within {:?}",
                        limit
                    )));
                }
            },
            None => response.await,
        };

        match received {
            Ok(decision) => {
                info!(run_id = %state.run_id, action = %decision.action, "Decision received");
                decision
            }
            Err(_) => {
                warn!(run_id = %state.run_id, "Decision responder dropped, rejecting");
                HumanDecision::reject(Some("decision responder dropped".to_string()))
            }
        }
    }
}
