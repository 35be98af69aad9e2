mod client;
pub mod comment;
mod pr;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::client::{Client, PullRequestPage};
use crate::model::{
    CommentTarget, PullRequest, PullRequestComment, PullRequestState, RepoKey, StateFilter,
};

/// `gh` CLI 経由の GitHub クライアント
pub struct GitHubClient {
    page_size: u32,
}

impl GitHubClient {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// 操作後の PR を取り直し、クライアント側の状態を上書きして返す。
    ///
    /// 操作自体は成功しているので、取り直しの失敗はエラーにしない。
    async fn refetch_with_state(
        &self,
        repo: &RepoKey,
        id: u64,
        state: PullRequestState,
    ) -> Result<PullRequest> {
        let mut refetched = pr::fetch_pr(repo, id).await;
        if let Ok(pr) = refetched.as_mut() {
            pr.state = state;
            if let Err(e) = self.fill_misc_info(repo, pr).await {
                warn!(%repo, id, "Failed to refresh reviews after update: {:#}", e);
            }
        }
        Ok(settle_transition(repo, id, state, refetched))
    }
}

/// 取り直しに失敗したら状態だけの結果にする
fn settle_transition(
    repo: &RepoKey,
    id: u64,
    state: PullRequestState,
    refetched: Result<PullRequest>,
) -> PullRequest {
    match refetched {
        Ok(pr) => pr,
        Err(e) => {
            warn!(%repo, id, "Failed to refetch pull request after update: {:#}", e);
            PullRequest::state_only(repo, id, state)
        }
    }
}

#[async_trait]
impl Client for GitHubClient {
    async fn get_pull_requests(
        &self,
        repo: &RepoKey,
        state: StateFilter,
        page_token: Option<&str>,
    ) -> Result<PullRequestPage> {
        pr::fetch_pr_page(repo, state, page_token, self.page_size).await
    }

    async fn approve(&self, repo: &RepoKey, id: u64) -> Result<PullRequest> {
        pr::approve(repo, id).await?;
        self.refetch_with_state(repo, id, PullRequestState::Approved)
            .await
    }

    async fn unapprove(&self, repo: &RepoKey, id: u64) -> Result<PullRequest> {
        pr::unapprove(repo, id).await?;
        self.refetch_with_state(repo, id, PullRequestState::Open)
            .await
    }

    async fn decline(&self, repo: &RepoKey, id: u64) -> Result<PullRequest> {
        pr::decline(repo, id).await?;
        self.refetch_with_state(repo, id, PullRequestState::Declined)
            .await
    }

    async fn merge(&self, repo: &RepoKey, id: u64) -> Result<PullRequest> {
        pr::merge(repo, id).await?;
        self.refetch_with_state(repo, id, PullRequestState::Merged)
            .await
    }

    async fn get_comments(&self, repo: &RepoKey, id: u64) -> Result<Vec<PullRequestComment>> {
        comment::fetch_comments(repo, id).await
    }

    async fn create_comment(
        &self,
        repo: &RepoKey,
        id: u64,
        content: &str,
        target: &CommentTarget,
    ) -> Result<PullRequestComment> {
        comment::create_comment(repo, id, content, target).await
    }

    async fn delete_comment(&self, repo: &RepoKey, _id: u64, comment_id: &str) -> Result<()> {
        comment::delete_comment(repo, comment_id).await
    }

    async fn fill_misc_info(&self, repo: &RepoKey, pr: &mut PullRequest) -> Result<()> {
        let reviews = pr::fetch_reviews(repo, pr.id).await?;
        let (approvals, change_requests) = pr::summarize_reviews(&reviews);
        if pr.state == PullRequestState::Open && !approvals.is_empty() {
            pr.state = PullRequestState::Approved;
        }
        pr.approvals = approvals;
        pr.change_requests = change_requests;

        // 一覧 API はコメント数を含まないので単体取得で補う
        let detail = pr::fetch_pr(repo, pr.id).await?;
        pr.comment_count = detail.comment_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_failed_refetch_keeps_new_state() {
        let repo = RepoKey::github("o/r");
        let pr = settle_transition(
            &repo,
            7,
            PullRequestState::Merged,
            Err(anyhow!("HTTP 502")),
        );
        assert!(pr.is_state_only());
        assert_eq!(pr.id, 7);
        assert_eq!(pr.repo, repo);
        assert_eq!(pr.state, PullRequestState::Merged);
    }

    #[test]
    fn test_successful_refetch_is_returned_as_is() {
        let repo = RepoKey::github("o/r");
        let mut fetched = PullRequest::state_only(&repo, 7, PullRequestState::Approved);
        fetched.url = "https://github.com/o/r/pull/7".to_string();
        fetched.title = "Add cache".to_string();
        let pr = settle_transition(&repo, 7, PullRequestState::Approved, Ok(fetched));
        assert!(!pr.is_state_only());
        assert_eq!(pr.title, "Add cache");
    }
}
