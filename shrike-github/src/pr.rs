//! Pull request lookup and reference parsing

use crate::{Error, GitHubClient, Result};
use chrono::{DateTime, Utc};
use octocrab::models::pulls::PullRequest as OctocrabPR;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A parsed reference to a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    /// Parse a pull request reference
    ///
    /// Supports formats:
    /// - owner/repo#123
    /// - https://github.com/owner/repo/pull/123
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.starts_with("https://") || input.starts_with("http://") {
            let url = url::Url::parse(input).map_err(|e| Error::Parse(e.to_string()))?;
            let segments: Vec<&str> = url.path().trim_matches('/').split('/').collect();
            if segments.len() >= 4 && segments[2] == "pull" {
                let number = segments[3].parse::<u64>().map_err(|_| {
                    Error::Parse(format!("Invalid pull request number: {}", segments[3]))
                })?;
                return Ok(Self {
                    owner: segments[0].to_string(),
                    repo: segments[1].to_string(),
                    number,
                });
            }
            return Err(Error::Parse(format!(
                "Not a pull request URL: {}. Expected https://github.com/owner/repo/pull/123",
                input
            )));
        }

        if let Some((slug, number)) = input.split_once('#') {
            let (owner, repo) = slug.split_once('/').ok_or_else(|| {
                Error::Parse(format!(
                    "Invalid repository in '{}'. Expected owner/repo#123",
                    input
                ))
            })?;
            if owner.is_empty() || repo.is_empty() {
                return Err(Error::Parse(format!("Invalid repository in '{}'", input)));
            }
            let number = number
                .parse::<u64>()
                .map_err(|_| Error::Parse(format!("Invalid pull request number: {}", number)))?;
            return Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            });
        }

        Err(Error::Parse(format!(
            "Unrecognized pull request reference: {}. Expected owner/repo#123 or a GitHub PR URL",
            input
        )))
    }

    /// `owner/repo` form
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for PrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Pull request representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body
    pub body: String,
    /// Current state (open, closed)
    pub state: PrState,
    /// Whether the PR has been merged (derived from merged_at)
    pub merged: bool,
    /// Head commit SHA
    pub head_sha: String,
    /// Base commit SHA
    pub base_sha: String,
    /// Head branch name
    pub head_branch: String,
    /// Base branch name
    pub base_branch: String,
    /// When the PR was created
    pub created_at: DateTime<Utc>,
    /// When the PR was last updated
    pub updated_at: DateTime<Utc>,
}

/// PR state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

impl From<octocrab::models::IssueState> for PrState {
    fn from(state: octocrab::models::IssueState) -> Self {
        match state {
            octocrab::models::IssueState::Open => PrState::Open,
            octocrab::models::IssueState::Closed => PrState::Closed,
            _ => PrState::Open, // Default for unknown states
        }
    }
}

impl From<OctocrabPR> for PullRequest {
    fn from(pr: OctocrabPR) -> Self {
        let merged = pr.merged_at.is_some();

        PullRequest {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            body: pr.body.unwrap_or_default(),
            state: pr.state.map(|s| s.into()).unwrap_or(PrState::Open),
            merged,
            head_sha: pr.head.sha,
            base_sha: pr.base.sha,
            head_branch: pr.head.ref_field,
            base_branch: pr.base.ref_field,
            created_at: pr.created_at.unwrap_or_else(Utc::now),
            updated_at: pr.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

impl GitHubClient {
    /// Get a pull request by number
    pub async fn get_pr(&self, number: u64) -> Result<PullRequest> {
        debug!(number, "Fetching pull request");

        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Not Found") =>
                {
                    Error::PrNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        Ok(pr.into())
    }

    /// Fetch the pull request's unified diff text
    pub async fn get_pr_diff(&self, number: u64) -> Result<String> {
        debug!(number, "Fetching pull request diff");

        let diff = self
            .client()
            .pulls(self.owner(), self.repo())
            .get_diff(number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Not Found") =>
                {
                    Error::PrNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        info!(number, bytes = diff.len(), "Fetched pull request diff");
        Ok(diff)
    }
}
