//! 外部コラボレータの境界
//!
//! リモートホストの REST クライアントとローカル git は、それぞれ [`Client`] と
//! [`GitUtilsClient`] を介してのみ利用する。実装は `github` / `git` モジュール、
//! テストではフェイク実装に差し替える。

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    CommentTarget, PullRequest, PullRequestComment, RepoKey, StateFilter,
};

/// 一覧取得の 1 ページ分
#[derive(Debug, Clone, Default)]
pub struct PullRequestPage {
    pub items: Vec<PullRequest>,
    /// 次ページがなければ None
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait Client: Send + Sync {
    async fn get_pull_requests(
        &self,
        repo: &RepoKey,
        state: StateFilter,
        page_token: Option<&str>,
    ) -> Result<PullRequestPage>;

    async fn approve(&self, repo: &RepoKey, id: u64) -> Result<PullRequest>;

    async fn unapprove(&self, repo: &RepoKey, id: u64) -> Result<PullRequest>;

    async fn decline(&self, repo: &RepoKey, id: u64) -> Result<PullRequest>;

    async fn merge(&self, repo: &RepoKey, id: u64) -> Result<PullRequest>;

    async fn get_comments(&self, repo: &RepoKey, id: u64) -> Result<Vec<PullRequestComment>>;

    async fn create_comment(
        &self,
        repo: &RepoKey,
        id: u64,
        content: &str,
        target: &CommentTarget,
    ) -> Result<PullRequestComment>;

    async fn delete_comment(&self, repo: &RepoKey, id: u64, comment_id: &str) -> Result<()>;

    /// approvals / change requests / comment count をその場で埋める
    async fn fill_misc_info(&self, repo: &RepoKey, pr: &mut PullRequest) -> Result<()>;
}

/// ローカル git から diff を得るためのエラー
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("commit {0} is not available in the local repository")]
    MissingCommit(String),
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait GitUtilsClient: Send + Sync {
    /// `base` から `head` への unified diff を返す。
    ///
    /// どちらかのハッシュがローカルに存在しない場合は空ではなくエラーを返す。
    async fn get_diff_patch(&self, base: &str, head: &str) -> Result<Vec<u8>, GitError>;
}
