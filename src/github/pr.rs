use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

use super::client::{gh_pr, GhRequest};
use crate::client::PullRequestPage;
use crate::model::{Branch, PullRequest, PullRequestState, RepoKey, StateFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct GhPullRequest {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub head: GhBranch,
    pub base: GhBranch,
    pub user: User,
    pub updated_at: String,
    /// 一覧 API には含まれず、単体取得時のみ存在する
    #[serde(default)]
    pub comments: Option<u32>,
    #[serde(default)]
    pub review_comments: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub id: u64,
    pub state: String,
    pub user: Option<User>,
}

impl GhPullRequest {
    pub fn into_pull_request(self, repo: &RepoKey) -> PullRequest {
        let state = match (self.state.as_str(), self.merged_at.is_some()) {
            (_, true) => PullRequestState::Merged,
            ("closed", false) => PullRequestState::Declined,
            _ => PullRequestState::Open,
        };
        let comment_count = self.comments.unwrap_or(0) + self.review_comments.unwrap_or(0);
        PullRequest {
            id: self.number,
            url: self.html_url,
            repo: repo.clone(),
            title: self.title,
            author: self.user.login,
            state,
            source: Branch {
                name: self.head.ref_name,
                commit_hash: self.head.sha,
            },
            destination: Branch {
                name: self.base.ref_name,
                commit_hash: self.base.sha,
            },
            approvals: Vec::new(),
            change_requests: Vec::new(),
            comments: Vec::new(),
            comment_count,
            updated_at: self.updated_at,
        }
    }
}

pub async fn fetch_pr(repo: &RepoKey, number: u64) -> Result<PullRequest> {
    let endpoint = format!("repos/{}/pulls/{}", repo.name, number);
    let pr: GhPullRequest = GhRequest::get(endpoint)
        .json()
        .await
        .with_context(|| format!("Failed to fetch PR #{} of {}", number, repo.name))?;
    Ok(pr.into_pull_request(repo))
}

/// PR 一覧を 1 ページ取得する。ページトークンは 1 始まりのページ番号。
pub async fn fetch_pr_page(
    repo: &RepoKey,
    state: StateFilter,
    page_token: Option<&str>,
    per_page: u32,
) -> Result<PullRequestPage> {
    let page: u32 = match page_token {
        Some(token) => token
            .parse()
            .with_context(|| format!("Invalid page token: {}", token))?,
        None => 1,
    };
    let api_state = match state {
        StateFilter::Open => "open",
        StateFilter::Merged | StateFilter::Declined => "closed",
    };
    let endpoint = format!(
        "repos/{}/pulls?state={}&per_page={}&page={}&sort=updated&direction=desc",
        repo.name, api_state, per_page, page
    );
    let raw: Vec<GhPullRequest> = GhRequest::get(endpoint).json().await?;
    let has_more = raw.len() as u32 >= per_page;

    let items = raw
        .into_iter()
        .map(|pr| pr.into_pull_request(repo))
        .filter(|pr| match state {
            StateFilter::Open => true,
            StateFilter::Merged => pr.state == PullRequestState::Merged,
            StateFilter::Declined => pr.state == PullRequestState::Declined,
        })
        .collect();

    Ok(PullRequestPage {
        items,
        next_page_token: has_more.then(|| (page + 1).to_string()),
    })
}

pub async fn fetch_reviews(repo: &RepoKey, number: u64) -> Result<Vec<Review>> {
    GhRequest::get(format!(
        "repos/{}/pulls/{}/reviews?per_page=100",
        repo.name, number
    ))
    .json_pages()
    .await
    .context("Failed to fetch reviews")
}

/// ユーザーごとの最新レビュー状態から (approvals, change_requests) を求める
pub fn summarize_reviews(reviews: &[Review]) -> (Vec<String>, Vec<String>) {
    // レビューは時系列順。COMMENTED は状態を上書きしない
    let mut latest: HashMap<&str, &str> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for review in reviews {
        let Some(user) = review.user.as_ref() else {
            continue;
        };
        match review.state.as_str() {
            "APPROVED" | "CHANGES_REQUESTED" | "DISMISSED" => {
                if latest.insert(&user.login, &review.state).is_none() {
                    order.push(&user.login);
                }
            }
            _ => {}
        }
    }

    let mut approvals = Vec::new();
    let mut change_requests = Vec::new();
    for login in order {
        match latest.get(login).copied() {
            Some("APPROVED") => approvals.push(login.to_string()),
            Some("CHANGES_REQUESTED") => change_requests.push(login.to_string()),
            _ => {}
        }
    }
    (approvals, change_requests)
}

pub async fn current_login() -> Result<String> {
    let user: User = GhRequest::get("user")
        .json()
        .await
        .context("Failed to resolve current user")?;
    Ok(user.login)
}

pub async fn approve(repo: &RepoKey, number: u64) -> Result<()> {
    gh_pr("review", &repo.name, number, &["--approve"]).await?;
    Ok(())
}

/// 自分の最新の APPROVED レビューを dismiss する
pub async fn unapprove(repo: &RepoKey, number: u64) -> Result<()> {
    let login = current_login().await?;
    let reviews = fetch_reviews(repo, number).await?;
    let review = reviews
        .iter()
        .rev()
        .find(|r| {
            r.state == "APPROVED" && r.user.as_ref().is_some_and(|u| u.login == login)
        })
        .with_context(|| format!("No approval by {} on PR #{}", login, number))?;

    GhRequest::put(format!(
        "repos/{}/pulls/{}/reviews/{}/dismissals",
        repo.name, number, review.id
    ))
    .field("message", "Approval withdrawn")
    .field("event", "DISMISS")
    .send()
    .await?;
    Ok(())
}

pub async fn decline(repo: &RepoKey, number: u64) -> Result<()> {
    gh_pr("close", &repo.name, number, &[]).await?;
    Ok(())
}

pub async fn merge(repo: &RepoKey, number: u64) -> Result<()> {
    gh_pr("merge", &repo.name, number, &["--merge"]).await?;
    Ok(())
}
