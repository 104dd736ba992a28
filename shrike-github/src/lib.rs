//! Shrike GitHub - GitHub integration for Shrike
//!
//! This crate provides GitHub API access for resolving pull request
//! references, fetching diffs, and posting finished reviews back as
//! comments.

mod client;
mod error;
mod pr;
mod publish;

pub use client::GitHubClient;
pub use error::{Error, Result};
pub use pr::{PrRef, PrState, PullRequest};
