use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::PullRequestPage;
use crate::model::{PullRequest, PullRequestComment, RepoKey};

use super::file_tree::FileTree;
use super::review::DIFF_UNAVAILABLE_MESSAGE;
use super::types::*;
use super::App;

impl App {
    /// 溜まっている通知をすべて反映する（描画の直前に 1 回呼ぶ）
    pub(crate) fn poll_messages(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(message) => self.handle_message(message),
                Err(mpsc::error::TryRecvError::Empty) => break,
                // App が送信側を持っているので切断は起こらない
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
    }

    pub(crate) fn handle_message(&mut self, message: UiMessage) {
        match message {
            UiMessage::PageLoaded {
                generation,
                repo,
                result,
            } => self.apply_page(generation, repo, result),
            UiMessage::Enriched {
                generation,
                repo,
                id,
                result,
            } => self.apply_enrichment(generation, repo, id, result),
            UiMessage::BatchItem {
                action,
                url,
                result,
            } => self.apply_batch_item(action, &url, result),
            UiMessage::BatchFinished { action, received } => {
                self.finish_batch(action, received)
            }
            UiMessage::ReviewLoaded { url, result } => self.apply_review(&url, result),
            UiMessage::CommentsLoaded { url, result } => self.apply_comments(&url, result),
            UiMessage::CommentCreated {
                url,
                temp_id,
                result,
            } => self.apply_comment_created(&url, &temp_id, result),
            UiMessage::CommentDeleted {
                url,
                comment_id,
                result,
            } => self.apply_comment_deleted(&url, &comment_id, result),
        }
    }

    fn apply_page(
        &mut self,
        generation: u64,
        repo: RepoKey,
        result: Result<PullRequestPage, String>,
    ) {
        if !self.app_state.is_current(generation) {
            debug!(generation, %repo, "Dropping page from a previous load");
            return;
        }
        match result {
            Ok(page) => {
                debug!(%repo, count = page.items.len(), more = page.next_page_token.is_some(), "Page loaded");
                if let Err(e) =
                    self.app_state
                        .insert_page(&repo, &page.items, page.next_page_token.clone())
                {
                    warn!("{}", e);
                    return;
                }
                let ids: Vec<u64> = page.items.iter().map(|pr| pr.id).collect();
                if let Err(e) = self.table.append_page(&repo, page.items) {
                    warn!("{}", e);
                }
                self.spawn_enrichment(generation, &repo, &ids);
            }
            Err(message) => {
                warn!(%repo, "Failed to load pull requests: {}", message);
                let _ = self.app_state.set_loading(&repo, false);
                if let Err(e) = self.table.set_failed(&repo, message) {
                    warn!("{}", e);
                }
            }
        }
    }

    /// 補完は再試行しない。失敗しても読み込み中の表示だけ消す。
    ///
    /// 補完結果は取得時点のスナップショットなので、レビュー集計だけを取り込む。
    /// バルク操作が触れた行は状態の昇格も受け入れない。
    fn apply_enrichment(
        &mut self,
        generation: u64,
        repo: RepoKey,
        id: u64,
        result: Result<PullRequest, String>,
    ) {
        if !self.app_state.is_current(generation) {
            return;
        }
        let enriched = match result {
            Ok(pr) => Some(pr),
            Err(message) => {
                warn!(%repo, id, "Failed to enrich pull request: {}", message);
                None
            }
        };
        let Some(url) = self
            .app_state
            .pull_request(&repo, id)
            .map(|view| view.pull_request.url.clone())
        else {
            debug!(%repo, id, "Enrichment for an unknown pull request");
            return;
        };
        let promote_state = self
            .table
            .find_row(&url)
            .is_ok_and(|row| row.status == RowStatus::Idle);

        if let Err(e) =
            self.app_state
                .finish_enrichment(&repo, id, enriched.as_ref(), promote_state)
        {
            debug!("{}", e);
            return;
        }
        let merged = match &enriched {
            Some(pr) => self.table.merge_enrichment(&url, pr, promote_state),
            None => self.table.finish_enrichment(&url),
        };
        if let Err(e) = merged {
            debug!("{}", e);
        }
    }

    fn apply_batch_item(
        &mut self,
        action: BulkAction,
        url: &str,
        result: Result<PullRequest, String>,
    ) {
        let Some(batch) = self.batch.as_mut() else {
            debug!(url, "Batch result without a running batch");
            return;
        };
        match result {
            Ok(result) => {
                batch.succeeded += 1;
                let mut pr = match self.table.find_row(url) {
                    Ok(row) => row.pull_request.clone(),
                    Err(e) => {
                        warn!("{}", e);
                        return;
                    }
                };
                pr.apply_transition(result);
                if let Err(e) = self.app_state.replace(&pr) {
                    warn!("{}", e);
                }
                if let Err(e) = self
                    .table
                    .update_pull_request(pr)
                    .and_then(|()| self.table.set_status(url, RowStatus::Done))
                {
                    warn!("{}", e);
                }
            }
            Err(message) => {
                batch.failed += 1;
                warn!(action = action.label(), url, "Bulk action failed: {}", message);
                if let Some(previous) = batch.previous.get(url).copied() {
                    if let Err(e) = self.table.set_state(url, previous) {
                        warn!("{}", e);
                    }
                }
                if let Err(e) = self.table.set_status(url, RowStatus::Error(message)) {
                    warn!("{}", e);
                }
            }
        }
    }

    fn finish_batch(&mut self, action: BulkAction, received: usize) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        info!(
            action = action.label(),
            received,
            succeeded = batch.succeeded,
            failed = batch.failed,
            "Bulk action finished"
        );
        self.flash(format!(
            "{}: {} done, {} failed",
            action.label(),
            batch.succeeded,
            batch.failed
        ));
    }

    fn apply_review(
        &mut self,
        url: &str,
        result: Result<Vec<u8>, ReviewLoadError>,
    ) {
        let Some(view) = self.review.as_mut() else {
            debug!(url, "Review closed before data arrived");
            return;
        };
        if view.panel.pull_request.url != url {
            debug!(url, "Dropping data for a different review");
            return;
        }
        match result {
            Ok(diff) => {
                let pr = view.panel.pull_request.clone();
                let label = format!("#{} {}", pr.id, pr.title);
                view.panel.set_data(pr, &diff, Vec::new());
                view.tree = FileTree::new(view.panel.files(), label);
            }
            Err(ReviewLoadError::DiffUnavailable(message)) => {
                warn!(url, "Diff unavailable: {}", message);
                view.panel.set_error(DIFF_UNAVAILABLE_MESSAGE);
            }
            Err(ReviewLoadError::Other(message)) => {
                warn!(url, "Failed to load review: {}", message);
                view.panel.set_error(format!("Failed to load review: {}", message));
            }
        }
    }

    /// コメントの取得失敗は diff の表示を妨げない
    fn apply_comments(&mut self, url: &str, result: Result<Vec<PullRequestComment>, String>) {
        let Some(view) = self
            .review
            .as_mut()
            .filter(|view| view.panel.pull_request.url == url)
        else {
            debug!(url, "Review closed before comments arrived");
            return;
        };
        match result {
            Ok(comments) => {
                debug!(url, count = comments.len(), "Comments loaded");
                view.panel.merge_comments(comments);
            }
            Err(message) => {
                warn!(url, "Failed to load comments: {}", message);
                self.flash(format!("Failed to load comments: {}", message));
            }
        }
    }

    fn apply_comment_created(
        &mut self,
        url: &str,
        temp_id: &str,
        result: Result<PullRequestComment, String>,
    ) {
        let Some(view) = self
            .review
            .as_mut()
            .filter(|view| view.panel.pull_request.url == url)
        else {
            debug!(url, "Review closed before the comment was stored");
            return;
        };
        let outcome = match result {
            Ok(comment) => view.panel.confirm_comment(temp_id, comment),
            Err(message) => {
                warn!(url, "Failed to create comment: {}", message);
                let outcome = view.panel.fail_comment(temp_id);
                self.flash(format!("Failed to post comment: {}", message));
                outcome
            }
        };
        if let Err(e) = outcome {
            debug!("{}", e);
        }
    }

    fn apply_comment_deleted(&mut self, url: &str, comment_id: &str, result: Result<(), String>) {
        let Some(view) = self
            .review
            .as_mut()
            .filter(|view| view.panel.pull_request.url == url)
        else {
            debug!(url, "Review closed before the comment was deleted");
            return;
        };
        let succeeded = result.is_ok();
        if let Err(e) = view.panel.finish_delete(comment_id, succeeded) {
            debug!("{}", e);
        }
        if let Err(message) = result {
            warn!(url, comment_id, "Failed to delete comment: {}", message);
            self.flash(format!("Failed to delete comment: {}", message));
        }
    }
}
