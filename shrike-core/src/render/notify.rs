//! Webhook notification payloads and delivery
//!
//! Payloads use Slack's block layout. Delivery is best effort: every
//! failure path returns `false` and the run carries on.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::model::{ReviewIssue, Severity, WorkflowState};
use crate::services::Notifier;

/// How many issues the notification shows in full
const TOP_ISSUE_LIMIT: usize = 5;

/// Build the notification payload for a completed run
pub fn review_payload(
    state: &WorkflowState,
    pr_url: Option<&str>,
    comment_url: Option<&str>,
) -> Value {
    let total = state.issues.len();
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": header_text(state),
                "emoji": true
            }
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Summary*\n{}", summary_text(state)) }
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Issue Breakdown*\n{}", breakdown_text(state)) }
        }),
    ];

    let top = top_issues(&state.issues);
    if !top.is_empty() {
        blocks.push(json!({ "type": "divider" }));
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Top {} Issues*", top.len()) }
        }));
        for (i, issue) in top.iter().enumerate() {
            blocks.push(json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": issue_text(issue, i + 1) }
            }));
        }
    }

    let links = links_text(pr_url, comment_url);
    if !links.is_empty() {
        blocks.push(json!({ "type": "divider" }));
        blocks.push(json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Links*\n{}", links) }
        }));
    }

    blocks.push(json!({
        "type": "context",
        "elements": [{
            "type": "mrkdwn",
            "text": format!("Run {} • {}", state.run_id, chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"))
        }]
    }));

    json!({
        "blocks": blocks,
        "attachments": [{
            "color": status_color(state),
            "fallback": format!("Review complete: {} issue(s) found", total)
        }]
    })
}

fn header_text(state: &WorkflowState) -> String {
    match state.pr_number {
        Some(number) => format!("Review: {} #{}", state.repo_name, number),
        None => format!("Review: {}", state.repo_slug()),
    }
}

fn summary_text(state: &WorkflowState) -> String {
    let mut lines = vec![
        format!("Reviewed {} code change(s)", state.hunks.len()),
        format!("Found {} issue(s)", state.issues.len()),
    ];
    if !state.fix_tasks.is_empty() {
        lines.push(format!("Generated {} fix task(s)", state.fix_tasks.len()));
    }
    if let Some(decision) = &state.decision {
        lines.push(format!("Decision: {}", decision.action));
    }
    lines
        .iter()
        .map(|l| format!("• {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

fn breakdown_text(state: &WorkflowState) -> String {
    let counts = state.severity_counts();
    if counts.is_empty() {
        return "No issues found.".to_string();
    }
    let mut lines = vec![format!("Total: *{}*", state.issues.len())];
    for (severity, count) in counts {
        lines.push(format!("{} *{}*: {}", severity_emoji(severity), severity, count));
    }
    lines.join("\n")
}

/// Most severe first, insertion order within a severity
fn top_issues(issues: &[ReviewIssue]) -> Vec<&ReviewIssue> {
    let mut sorted: Vec<&ReviewIssue> = issues.iter().collect();
    sorted.sort_by_key(|i| std::cmp::Reverse(i.severity));
    sorted.truncate(TOP_ISSUE_LIMIT);
    sorted
}

fn issue_text(issue: &ReviewIssue, number: usize) -> String {
    let mut lines = vec![format!(
        "{} *{}. [{}]* `{}:{}`",
        severity_emoji(issue.severity),
        number,
        issue.category.label().to_uppercase(),
        issue.file_path,
        issue.line_number
    )];
    lines.push(truncated(&issue.explanation, 200));
    if let Some(suggestion) = &issue.suggestion {
        lines.push(format!("_Suggestion: {}_", truncated(suggestion, 150)));
    }
    lines.join("\n")
}

fn links_text(pr_url: Option<&str>, comment_url: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(url) = pr_url {
        lines.push(format!("• <{}|View pull request>", url));
    }
    if let Some(url) = comment_url {
        lines.push(format!("• <{}|View review comment>", url));
    }
    lines.join("\n")
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Blocker => ":red_circle:",
        Severity::Major => ":large_orange_circle:",
        Severity::Minor => ":large_yellow_circle:",
        Severity::Nit => ":large_blue_circle:",
    }
}

fn status_color(state: &WorkflowState) -> &'static str {
    match state.worst_severity() {
        Some(Severity::Blocker) => "danger",
        Some(Severity::Major) => "warning",
        Some(_) => "#36a64f",
        None => "good",
    }
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Posts payloads to a webhook URL
pub struct WebhookNotifier {
    http: reqwest::Client,
    webhook_url: String,
    /// Optional channel override injected into each payload
    channel: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>, channel: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            channel,
        }
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &Value) -> bool {
        let mut payload = payload.clone();
        if let (Some(channel), Some(object)) = (&self.channel, payload.as_object_mut()) {
            object.insert("channel".to_string(), Value::String(channel.clone()));
        }

        match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Notification delivered");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "Notification rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Notification failed");
                false
            }
        }
    }
}
