//! Publisher implementation posting reviews as PR comments

use async_trait::async_trait;
use tracing::info;

use crate::GitHubClient;
use shrike_core::services::Publisher;

#[async_trait]
impl Publisher for GitHubClient {
    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> shrike_core::Result<String> {
        let comment = self
            .client()
            .issues(owner, repo)
            .create_comment(pr_number, body)
            .await
            .map_err(|e| {
                shrike_core::Error::Publish(format!(
                    "Failed to post comment on {}/{}#{}: {}",
                    owner, repo, pr_number, e
                ))
            })?;

        let url = comment.html_url.to_string();
        info!(pr_number, url = %url, "Posted review comment");
        Ok(url)
    }
}
