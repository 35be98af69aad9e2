//! ドメインモデル
//!
//! プロバイダ非依存の PR / コメント表現。`github` モジュールなど各クライアントは
//! API レスポンスをここで定義する型に変換して返す。

use std::fmt;

use chrono::{DateTime, Local};

/// PR をホストしているサービス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    GitHub,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (provider, repository) の組。RepositoryData とテーブルセクションのキー。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoKey {
    pub provider: Provider,
    /// "owner/name"
    pub name: String,
}

impl RepoKey {
    pub fn github(name: impl Into<String>) -> Self {
        Self {
            provider: Provider::GitHub,
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

/// PR のライフサイクル状態
///
/// `Approving` / `Declining` / `Merging` はバッチ操作中のクライアント側の一時状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestState {
    Open,
    Approving,
    Approved,
    Declining,
    Declined,
    Merging,
    Merged,
    Superseded,
}

impl PullRequestState {
    pub fn label(&self) -> &'static str {
        match self {
            PullRequestState::Open => "OPEN",
            PullRequestState::Approving => "APPROVING",
            PullRequestState::Approved => "APPROVED",
            PullRequestState::Declining => "DECLINING",
            PullRequestState::Declined => "DECLINED",
            PullRequestState::Merging => "MERGING",
            PullRequestState::Merged => "MERGED",
            PullRequestState::Superseded => "SUPERSEDED",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PullRequestState::Approving | PullRequestState::Declining | PullRequestState::Merging
        )
    }
}

/// 一覧取得時の状態フィルタ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StateFilter {
    #[default]
    Open,
    Merged,
    Declined,
}

impl StateFilter {
    pub fn display_name(&self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Merged => "merged",
            StateFilter::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Branch {
    pub name: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub id: u64,
    /// リポジトリ横断で一意なキー
    pub url: String,
    pub repo: RepoKey,
    pub title: String,
    pub author: String,
    pub state: PullRequestState,
    pub source: Branch,
    pub destination: Branch,
    pub approvals: Vec<String>,
    pub change_requests: Vec<String>,
    pub comments: Vec<PullRequestComment>,
    pub comment_count: u32,
    pub updated_at: String,
}

impl PullRequest {
    /// 補完結果からレビュー集計だけを取り込む。
    ///
    /// 状態は上書きしない。`promote_state` のときだけ OPEN → APPROVED の昇格を受け入れる。
    pub fn merge_enrichment(&mut self, enriched: &PullRequest, promote_state: bool) {
        self.approvals = enriched.approvals.clone();
        self.change_requests = enriched.change_requests.clone();
        self.comment_count = enriched.comment_count;
        if promote_state
            && self.state == PullRequestState::Open
            && enriched.state == PullRequestState::Approved
        {
            self.state = PullRequestState::Approved;
        }
    }

    /// 操作は成功したが取り直しに失敗したときの結果。状態だけが意味を持つ。
    pub fn state_only(repo: &RepoKey, id: u64, state: PullRequestState) -> Self {
        Self {
            id,
            url: String::new(),
            repo: repo.clone(),
            title: String::new(),
            author: String::new(),
            state,
            source: Branch::default(),
            destination: Branch::default(),
            approvals: Vec::new(),
            change_requests: Vec::new(),
            comments: Vec::new(),
            comment_count: 0,
            updated_at: String::new(),
        }
    }

    pub fn is_state_only(&self) -> bool {
        self.url.is_empty()
    }

    /// バルク操作の結果を取り込む。状態だけの結果なら他の項目は手元の値を残す。
    pub fn apply_transition(&mut self, result: PullRequest) {
        if result.is_state_only() {
            self.state = result.state;
        } else {
            *self = result;
        }
    }

    pub fn descriptor(&self) -> PullRequestDescriptor {
        PullRequestDescriptor {
            url: self.url.clone(),
            repo: self.repo.clone(),
            id: self.id,
        }
    }
}

/// バッチ操作に渡す軽量な識別子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDescriptor {
    pub url: String,
    pub repo: RepoKey,
    pub id: u64,
}

/// PR コメント
///
/// `before_line` / `after_line` はどちらか一方のみ非ゼロ（diff のどちら側に付くか）。
/// ファイルに紐付かない会話コメントは `file_path` が空で両方ゼロ。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestComment {
    pub id: String,
    /// 空文字ならトップレベル
    pub parent_id: String,
    pub file_path: String,
    pub before_line: u32,
    pub after_line: u32,
    pub content: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted: bool,
    pub is_being_stored: bool,
    pub is_being_deleted: bool,
}

impl PullRequestComment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_empty()
    }

    pub fn is_inline(&self) -> bool {
        !self.file_path.is_empty() && (self.before_line != 0 || self.after_line != 0)
    }

    /// diff 行へのオーバーレイに使うキー
    pub fn line_key(&self) -> (u32, u32) {
        (self.before_line, self.after_line)
    }

    /// サーバ確定値で上書きする（スライス要素はそのまま）
    pub fn reconcile(&mut self, confirmed: PullRequestComment) {
        *self = PullRequestComment {
            is_being_stored: false,
            is_being_deleted: false,
            ..confirmed
        };
    }
}

/// コメントの付け先（diff 側）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSide {
    Before,
    After,
}

/// 新規コメントの付け先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    Line {
        file_path: String,
        side: LineSide,
        line: u32,
    },
    Reply {
        parent_id: String,
    },
}

/// RFC3339 のタイムスタンプを表示用に整形する。パースできなければそのまま返す。
pub fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// 検索対象が存在しない場合のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} not found: {key}")]
pub struct NotFound {
    pub kind: &'static str,
    pub key: String,
}

impl NotFound {
    pub fn new(kind: &'static str, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}
