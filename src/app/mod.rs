use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{Client, GitUtilsClient};
use crate::config::Config;
use crate::event_bus::EventBus;
use crate::filter::QueryInput;
use crate::model::{CommentTarget, PullRequestState, RepoKey, StateFilter};
use crate::ui;

mod types;
pub use types::*;

mod actions;
pub mod file_tree;
pub mod filter_modal;
mod input;
mod polling;
pub mod pr_table;
pub mod review;
pub mod state;
pub mod thread;
#[cfg(test)]
mod tests;

use file_tree::FileTree;
use filter_modal::FilterModal;
use pr_table::PullRequestTable;
use review::{ReviewPanel, ReviewState};
use state::ApplicationState;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// 楽観的に追加したコメントの作者名（確定値で上書きされる）
pub(crate) const LOCAL_AUTHOR: &str = "you";

/// レビュー画面の 2 ペイン
pub struct ReviewView {
    pub panel: ReviewPanel,
    pub tree: FileTree,
    pub focus: ReviewFocus,
}

/// 実行中のバルク操作
#[derive(Debug)]
pub(crate) struct BatchProgress {
    pub action: BulkAction,
    /// 一時状態に切り替える前の状態（失敗時に戻す）
    pub previous: HashMap<String, PullRequestState>,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct App {
    pub config: Config,
    pub repos: Vec<RepoKey>,
    pub state_filter: StateFilter,
    pub screen: Screen,
    /// ヘルプを閉じたときに戻る画面
    previous_screen: Screen,
    pub app_state: ApplicationState,
    pub table: PullRequestTable,
    /// 入力中のテーブルフィルタ
    pub table_filter: Option<QueryInput>,
    pub review: Option<ReviewView>,
    pub modal: Option<(FilterModal, ModalPurpose)>,
    /// ステータスバーに出す一時メッセージ
    pub flash: Option<String>,
    pub should_quit: bool,
    spinner_frame: usize,
    client: Arc<dyn Client>,
    git: Arc<dyn GitUtilsClient>,
    tx: mpsc::UnboundedSender<UiMessage>,
    rx: mpsc::UnboundedReceiver<UiMessage>,
    bus: EventBus<Topic, App, BusEvent>,
    event_queue: VecDeque<(Topic, BusEvent)>,
    dispatching: bool,
    batch: Option<BatchProgress>,
    /// 次のティックでエディタを開く付け先
    pending_editor: Option<CommentTarget>,
}

impl App {
    pub fn new(
        config: Config,
        repos: Vec<RepoKey>,
        state_filter: StateFilter,
        client: Arc<dyn Client>,
        git: Arc<dyn GitUtilsClient>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut app = Self {
            config,
            table: PullRequestTable::new(&repos),
            repos,
            state_filter,
            screen: Screen::Table,
            previous_screen: Screen::Table,
            app_state: ApplicationState::default(),
            table_filter: None,
            review: None,
            modal: None,
            flash: None,
            should_quit: false,
            spinner_frame: 0,
            client,
            git,
            tx,
            rx,
            bus: EventBus::new(),
            event_queue: VecDeque::new(),
            dispatching: false,
            batch: None,
            pending_editor: None,
        };
        app.register_subscribers();
        app
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = ui::setup_terminal()?;
        self.load_repositories();

        let result = self.event_loop(&mut terminal).await;

        ui::restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut ui::Tui) -> Result<()> {
        while !self.should_quit {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            self.poll_messages();
            terminal.draw(|frame| ui::render(frame, self))?;
            self.handle_input()?;
            if let Some(target) = self.pending_editor.take() {
                self.compose_comment(terminal, target)?;
            }
        }
        Ok(())
    }

    /// エディタを開く間だけ端末を通常モードに戻す
    fn compose_comment(&mut self, terminal: &mut ui::Tui, target: CommentTarget) -> Result<()> {
        let context = match &target {
            CommentTarget::Line {
                file_path, line, ..
            } => format!("{}:{}", file_path, line),
            CommentTarget::Reply { parent_id } => format!("reply to comment {}", parent_id),
        };
        ui::restore_terminal(terminal)?;
        let editor_result = crate::editor::open_comment_editor(self.config.editor(), &context);
        // エディタの成否に関わらずターミナルを再セットアップ
        *terminal = ui::setup_terminal()?;

        match editor_result {
            Ok(Some(body)) => self.submit_comment(target, body),
            Ok(None) => self.flash("Comment cancelled"),
            Err(e) => {
                warn!("Editor failed: {:#}", e);
                self.flash(format!("Editor failed: {}", e));
            }
        }
        Ok(())
    }

    pub fn spinner_char(&self) -> &str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    pub(crate) fn flash(&mut self, message: impl Into<String>) {
        self.flash = Some(message.into());
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch.is_some()
    }

    /// レビューが Ready のときだけ返す
    pub(crate) fn ready_review(&mut self) -> Option<&mut ReviewView> {
        self.review
            .as_mut()
            .filter(|view| *view.panel.state() == ReviewState::Ready)
    }

    /// バスに publish する。購読者の中からの publish はキューに積み、外側のループで順に配る。
    pub(crate) fn publish(&mut self, topic: Topic, event: BusEvent) {
        self.event_queue.push_back((topic, event));
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some((topic, event)) = self.event_queue.pop_front() {
            let mut bus = std::mem::take(&mut self.bus);
            let delivered = bus.publish(&topic, self, &event);
            self.bus = bus;
            debug!(?topic, delivered, "published");
        }
        self.dispatching = false;
    }

    fn register_subscribers(&mut self) {
        let bus = &mut self.bus;

        bus.subscribe(Topic::OpenReview, |app: &mut App, event: &BusEvent| {
            if let BusEvent::Review(descriptor) = event {
                app.open_review(descriptor.clone());
            }
        });

        bus.subscribe(Topic::CloseReview, |app: &mut App, _: &BusEvent| {
            app.review = None;
            app.modal = None;
            app.screen = Screen::Table;
        });

        // ツリーの選択行に応じてステータスページかファイルを表示する
        bus.subscribe(Topic::TreeSelectionChanged, |app: &mut App, _: &BusEvent| {
            let Some(view) = app.review.as_ref() else {
                return;
            };
            match view.tree.page.selected_reference().cloned() {
                Some(LineReference::TreeRoot) => {
                    app.publish(Topic::StatusPageSelected, BusEvent::Empty)
                }
                Some(LineReference::TreeFile(id)) => {
                    app.publish(Topic::FileSelected, BusEvent::File(id))
                }
                _ => {}
            }
        });

        bus.subscribe(Topic::FileSelected, |app: &mut App, event: &BusEvent| {
            let BusEvent::File(id) = event else {
                return;
            };
            let Some(view) = app.review.as_mut() else {
                return;
            };
            if let Err(e) = view.panel.show_file(id) {
                warn!("{}", e);
                return;
            }
            view.tree.select_file(id);
        });

        bus.subscribe(Topic::StatusPageSelected, |app: &mut App, _: &BusEvent| {
            if let Some(view) = app.review.as_mut() {
                view.panel.show_status_page();
            }
        });
    }
}
