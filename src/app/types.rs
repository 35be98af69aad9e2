use crate::client::PullRequestPage;
use crate::diff::LineType;
use crate::model::{PullRequest, PullRequestComment, PullRequestDescriptor, PullRequestState, RepoKey};

/// 画面の各行が指すドメインオブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineReference {
    RepositoryHeader(RepoKey),
    PullRequest { url: String },
    /// ファイルツリーのルート（ステータスページ）
    TreeRoot,
    TreeDirectory(String),
    /// ファイル id
    TreeFile(String),
    DiffLine {
        file_path: String,
        /// 削除行なら旧ファイル、それ以外は新ファイルの行番号
        line_number: u32,
        kind: LineType,
    },
    /// コメント id
    Comment(String),
    FilterItem(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Table,
    Review,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewFocus {
    #[default]
    Tree,
    Diff,
}

/// EventBus のトピック
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    OpenReview,
    CloseReview,
    TreeSelectionChanged,
    FileSelected,
    StatusPageSelected,
}

/// EventBus で運ぶデータ
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Empty,
    Review(PullRequestDescriptor),
    Index(usize),
    File(String),
}

/// テーブル行ごとのバルク操作の状態
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowStatus {
    #[default]
    Idle,
    Pending,
    Done,
    Error(String),
}

impl RowStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Idle => "",
            RowStatus::Pending => "…",
            RowStatus::Done => "Done",
            RowStatus::Error(_) => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Approve,
    Unapprove,
    Decline,
    Merge,
}

impl BulkAction {
    pub fn label(&self) -> &'static str {
        match self {
            BulkAction::Approve => "approve",
            BulkAction::Unapprove => "unapprove",
            BulkAction::Decline => "decline",
            BulkAction::Merge => "merge",
        }
    }

    /// 実行中に表示する一時状態（Unapprove は対応する状態がない）
    pub fn transient_state(&self) -> Option<PullRequestState> {
        match self {
            BulkAction::Approve => Some(PullRequestState::Approving),
            BulkAction::Unapprove => None,
            BulkAction::Decline => Some(PullRequestState::Declining),
            BulkAction::Merge => Some(PullRequestState::Merging),
        }
    }
}

/// フィルタモーダルを何に使っているか
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalPurpose {
    JumpToFile,
    OpenRepository,
}

/// レビュー画面の読み込み失敗
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewLoadError {
    /// ローカルに diff を作れない（コミットがない等）
    DiffUnavailable(String),
    Other(String),
}

/// バックグラウンドタスクから描画ループへの通知
#[derive(Debug)]
pub enum UiMessage {
    PageLoaded {
        generation: u64,
        repo: RepoKey,
        result: Result<PullRequestPage, String>,
    },
    Enriched {
        generation: u64,
        repo: RepoKey,
        id: u64,
        result: Result<PullRequest, String>,
    },
    BatchItem {
        action: BulkAction,
        url: String,
        result: Result<PullRequest, String>,
    },
    BatchFinished {
        action: BulkAction,
        received: usize,
    },
    ReviewLoaded {
        url: String,
        result: Result<Vec<u8>, ReviewLoadError>,
    },
    CommentsLoaded {
        url: String,
        result: Result<Vec<PullRequestComment>, String>,
    },
    CommentCreated {
        url: String,
        temp_id: String,
        result: Result<PullRequestComment, String>,
    },
    CommentDeleted {
        url: String,
        comment_id: String,
        result: Result<(), String>,
    },
}
