//! バックグラウンドタスクを起動する操作
//!
//! ここでは状態を「実行中」にしてタスクを投げるだけで、結果の反映は `polling` 側で行う。

use std::collections::HashMap;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::batch::BatchOperationCoordinator;
use crate::cache;
use crate::client::GitError;
use crate::config::parse_repo;
use crate::model::{CommentTarget, PullRequestDescriptor, RepoKey};

use super::file_tree::FileTree;
use super::filter_modal::FilterModal;
use super::review::ReviewPanel;
use super::types::*;
use super::{App, BatchProgress, ReviewView, LOCAL_AUTHOR};

impl App {
    /// 全リポジトリの最初のページを取り直す
    pub(crate) fn load_repositories(&mut self) {
        let generation = self.app_state.reset(&self.repos);
        self.table.reset(&self.repos);
        info!(
            generation,
            repositories = self.repos.len(),
            state = self.state_filter.display_name(),
            "Loading pull requests"
        );
        for repo in self.repos.clone() {
            self.spawn_page_fetch(generation, repo, None);
        }
    }

    /// ページトークンを持つリポジトリの次ページを読む
    pub(crate) fn load_next_pages(&mut self) {
        let pending = self.app_state.pending_pages();
        if pending.is_empty() {
            self.flash("No more pages");
            return;
        }
        let generation = self.app_state.generation();
        for (repo, token) in pending {
            if let Err(e) = self.app_state.set_loading(&repo, true) {
                warn!("{}", e);
                continue;
            }
            self.spawn_page_fetch(generation, repo, Some(token));
        }
    }

    fn spawn_page_fetch(&self, generation: u64, repo: RepoKey, token: Option<String>) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let state = self.state_filter;
        tokio::spawn(async move {
            let result = client
                .get_pull_requests(&repo, state, token.as_deref())
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(UiMessage::PageLoaded {
                generation,
                repo,
                result,
            });
        });
    }

    /// 1 件ごとに approvals / change requests / comment count を補完する
    pub(crate) fn spawn_enrichment(&self, generation: u64, repo: &RepoKey, ids: &[u64]) {
        for &id in ids {
            let Some(view) = self.app_state.pull_request(repo, id) else {
                continue;
            };
            let mut pr = view.pull_request.clone();
            let client = self.client.clone();
            let tx = self.tx.clone();
            let repo = repo.clone();
            tokio::spawn(async move {
                let result = client
                    .fill_misc_info(&repo, &mut pr)
                    .await
                    .map(|()| pr)
                    .map_err(|e| format!("{:#}", e));
                let _ = tx.send(UiMessage::Enriched {
                    generation,
                    repo,
                    id,
                    result,
                });
            });
        }
    }

    /// 選択中かつ表示中の行にバルク操作を実行する
    pub(crate) fn start_bulk_action(&mut self, action: BulkAction) {
        if let Some(running) = &self.batch {
            self.flash(format!("{} is still running", running.action.label()));
            return;
        }
        let targets = self.table.selected_visible();
        if targets.is_empty() {
            self.flash("No pull requests selected");
            return;
        }

        let mut previous = HashMap::new();
        for descriptor in &targets {
            let url = descriptor.url.as_str();
            match self.table.find_row(url) {
                Ok(row) => {
                    previous.insert(url.to_string(), row.pull_request.state);
                }
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            }
            let marked = self.table.set_status(url, RowStatus::Pending).and_then(|()| {
                match action.transient_state() {
                    Some(state) => self.table.set_state(url, state),
                    None => Ok(()),
                }
            });
            if let Err(e) = marked {
                warn!("{}", e);
            }
        }
        info!(action = action.label(), count = targets.len(), "Starting bulk action");
        self.batch = Some(BatchProgress {
            action,
            previous,
            succeeded: 0,
            failed: 0,
        });

        let items: Vec<(String, PullRequestDescriptor)> = targets
            .into_iter()
            .map(|d| (d.url.clone(), d))
            .collect();
        let coordinator = BatchOperationCoordinator::new(self.config.batch_concurrency);
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result_tx = tx.clone();
            let received = coordinator
                .run(
                    items,
                    move |d: PullRequestDescriptor| {
                        let client = client.clone();
                        async move {
                            match action {
                                BulkAction::Approve => client.approve(&d.repo, d.id).await,
                                BulkAction::Unapprove => client.unapprove(&d.repo, d.id).await,
                                BulkAction::Decline => client.decline(&d.repo, d.id).await,
                                BulkAction::Merge => client.merge(&d.repo, d.id).await,
                            }
                        }
                    },
                    |result| {
                        let _ = result_tx.send(UiMessage::BatchItem {
                            action,
                            url: result.id,
                            result: result.outcome.map_err(|e| format!("{:#}", e)),
                        });
                    },
                )
                .await;
            let _ = tx.send(UiMessage::BatchFinished { action, received });
        });
    }

    /// レビュー画面を開き、diff とコメントを読み込む
    pub(crate) fn open_review(&mut self, descriptor: PullRequestDescriptor) {
        let pr = match self.table.find_row(&descriptor.url) {
            Ok(row) => row.pull_request.clone(),
            Err(e) => {
                warn!("Cannot open review: {}", e);
                return;
            }
        };
        let label = format!("#{} {}", pr.id, pr.title);
        self.review = Some(ReviewView {
            panel: ReviewPanel::new(pr.clone()),
            tree: FileTree::new(&[], label),
            focus: ReviewFocus::Tree,
        });
        self.screen = Screen::Review;

        // diff (ローカル) とコメント (API) は別々に届き、互いの失敗に影響されない
        let git = self.git.clone();
        let tx = self.tx.clone();
        let (base, head) = (
            pr.destination.commit_hash.clone(),
            pr.source.commit_hash.clone(),
        );
        let url = pr.url.clone();
        tokio::spawn(async move {
            let result = git
                .get_diff_patch(&base, &head)
                .await
                .map_err(|e| match &e {
                    GitError::MissingCommit(_) => ReviewLoadError::DiffUnavailable(e.to_string()),
                    _ => ReviewLoadError::Other(e.to_string()),
                });
            let _ = tx.send(UiMessage::ReviewLoaded { url, result });
        });

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .get_comments(&pr.repo, pr.id)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(UiMessage::CommentsLoaded {
                url: pr.url,
                result,
            });
        });
    }

    /// 選択行にコメントを書くため、次のティックでエディタを開く
    pub(crate) fn request_comment(&mut self) {
        let Some(view) = self.ready_review() else {
            return;
        };
        match view.panel.comment_target() {
            Some(target) => self.pending_editor = Some(target),
            None => self.flash("Select a diff line or a comment to reply to"),
        }
    }

    /// プレースホルダを表示してから作成 API を呼ぶ
    pub(crate) fn submit_comment(&mut self, target: CommentTarget, body: String) {
        let Some(view) = self.ready_review() else {
            debug!("Review closed before the comment was submitted");
            return;
        };
        let temp_id = match view.panel.add_placeholder(&target, &body, LOCAL_AUTHOR) {
            Ok(id) => id,
            Err(e) => {
                warn!("Cannot add comment: {}", e);
                return;
            }
        };
        let pr = view.panel.pull_request.descriptor();

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .create_comment(&pr.repo, pr.id, &body, &target)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(UiMessage::CommentCreated {
                url: pr.url,
                temp_id,
                result,
            });
        });
    }

    pub(crate) fn delete_selected_comment(&mut self) {
        let Some(view) = self.ready_review() else {
            return;
        };
        let Some(comment_id) = view.panel.selected_comment_id() else {
            return;
        };
        match view.panel.comment(&comment_id) {
            Some(c) if c.deleted || c.is_being_deleted || c.is_being_stored => {
                warn!("Comment {} cannot be deleted in its current state", comment_id);
                return;
            }
            Some(_) => {}
            None => return,
        }
        if let Err(e) = view.panel.begin_delete(&comment_id) {
            warn!("{}", e);
            return;
        }
        let pr = view.panel.pull_request.descriptor();

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .delete_comment(&pr.repo, pr.id, &comment_id)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(UiMessage::CommentDeleted {
                url: pr.url,
                comment_id,
                result,
            });
        });
    }

    pub(crate) fn open_jump_to_file(&mut self) {
        let Some(view) = self.ready_review() else {
            return;
        };
        let items = view.panel.files().iter().map(|f| f.id.clone()).collect();
        self.modal = Some((FilterModal::new("Jump to file", items), ModalPurpose::JumpToFile));
    }

    pub(crate) fn open_repository_picker(&mut self) {
        let mut items = cache::RecentRepositories::load_from(&cache::recent_path()).names();
        for raw in &self.config.repositories {
            if !items.contains(raw) {
                items.push(raw.clone());
            }
        }
        self.modal = Some((
            FilterModal::new("Open repository", items),
            ModalPurpose::OpenRepository,
        ));
    }

    /// モーダルで選ばれた項目を確定する
    pub(crate) fn confirm_modal(&mut self) {
        let Some((modal, purpose)) = self.modal.take() else {
            return;
        };
        let Some((_, item)) = modal.selected_item() else {
            return;
        };
        let item = item.to_string();
        match purpose {
            ModalPurpose::JumpToFile => {
                self.publish(Topic::FileSelected, BusEvent::File(item));
                if let Some(view) = self.review.as_mut() {
                    view.focus = ReviewFocus::Diff;
                }
            }
            ModalPurpose::OpenRepository => {
                if let Err(e) = self.add_repository(&item) {
                    warn!("{:#}", e);
                    self.flash(format!("{:#}", e));
                }
            }
        }
    }

    /// リポジトリをテーブルに加えて読み込み直す
    pub(crate) fn add_repository(&mut self, raw: &str) -> anyhow::Result<()> {
        let repo = parse_repo(raw)?;
        if let Err(e) = cache::record_visits([repo.name.as_str()])
            .with_context(|| format!("Failed to record visit to {}", repo))
        {
            warn!("{:#}", e);
        }
        if !self.repos.contains(&repo) {
            self.repos.push(repo);
        }
        self.load_repositories();
        Ok(())
    }
}
