use anyhow::{Context, Result};
use serde::Deserialize;

use super::client::GhRequest;
use super::pr::{fetch_pr, User};
use crate::model::{CommentTarget, LineSide, PullRequestComment, RepoKey};

/// 会話タブのコメント ID に付ける接頭辞（レビューコメントと ID 空間が異なる）
const ISSUE_COMMENT_PREFIX: &str = "issue:";

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub original_line: Option<u32>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    pub body: String,
    pub user: User,
    pub created_at: String,
    pub updated_at: String,
}

/// ディスカッションコメント（PRの会話タブのコメント）
#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionComment {
    pub id: u64,
    pub body: String,
    pub user: User,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewComment {
    pub fn into_comment(self) -> PullRequestComment {
        // outdated なコメントは line が null になるので original_line にフォールバック
        let line = self.line.or(self.original_line).unwrap_or(0);
        let (before_line, after_line) = match self.side.as_deref() {
            Some("LEFT") => (line, 0),
            _ => (0, line),
        };
        PullRequestComment {
            id: self.id.to_string(),
            parent_id: self
                .in_reply_to_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            file_path: self.path,
            before_line,
            after_line,
            content: self.body,
            author: self.user.login,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ..Default::default()
        }
    }
}

impl DiscussionComment {
    pub fn into_comment(self) -> PullRequestComment {
        PullRequestComment {
            id: format!("{}{}", ISSUE_COMMENT_PREFIX, self.id),
            content: self.body,
            author: self.user.login,
            created_at: self.created_at,
            updated_at: self.updated_at,
            ..Default::default()
        }
    }
}

pub async fn fetch_comments(repo: &RepoKey, number: u64) -> Result<Vec<PullRequestComment>> {
    let review: Vec<ReviewComment> = GhRequest::get(format!(
        "repos/{}/pulls/{}/comments?per_page=100",
        repo.name, number
    ))
    .json_pages()
    .await
    .context("Failed to fetch review comments")?;
    let discussion: Vec<DiscussionComment> = GhRequest::get(format!(
        "repos/{}/issues/{}/comments?per_page=100",
        repo.name, number
    ))
    .json_pages()
    .await
    .context("Failed to fetch conversation comments")?;

    Ok(review
        .into_iter()
        .map(ReviewComment::into_comment)
        .chain(discussion.into_iter().map(DiscussionComment::into_comment))
        .collect())
}

pub async fn create_comment(
    repo: &RepoKey,
    number: u64,
    content: &str,
    target: &CommentTarget,
) -> Result<PullRequestComment> {
    let created: ReviewComment = match target {
        CommentTarget::Line {
            file_path,
            side,
            line,
        } => {
            // commit_id は head のものが必要
            let pr = fetch_pr(repo, number).await?;
            let side = match side {
                LineSide::Before => "LEFT",
                LineSide::After => "RIGHT",
            };
            GhRequest::post(format!("repos/{}/pulls/{}/comments", repo.name, number))
                .field("body", content)
                .field("commit_id", &pr.source.commit_hash)
                .field("path", file_path)
                .typed_field("line", line)
                .field("side", side)
                .json()
                .await
                .context("Failed to create review comment")?
        }
        CommentTarget::Reply { parent_id } => {
            if parent_id.starts_with(ISSUE_COMMENT_PREFIX) {
                anyhow::bail!("Conversation comments cannot be replied to in a thread");
            }
            GhRequest::post(format!(
                "repos/{}/pulls/{}/comments/{}/replies",
                repo.name, number, parent_id
            ))
            .field("body", content)
            .json()
            .await
            .context("Failed to reply to comment")?
        }
    };
    Ok(created.into_comment())
}

pub async fn delete_comment(repo: &RepoKey, comment_id: &str) -> Result<()> {
    let endpoint = match comment_id.strip_prefix(ISSUE_COMMENT_PREFIX) {
        Some(id) => format!("repos/{}/issues/comments/{}", repo.name, id),
        None => format!("repos/{}/pulls/comments/{}", repo.name, comment_id),
    };
    GhRequest::delete(endpoint).send().await?;
    Ok(())
}
