//! レビューパネル: diff の描画とコメントスレッドの重ね合わせ
//!
//! 状態は `Loading → Ready` か `Loading → Error` のどちらかで、Error は終端。
//! コメントの作成・削除は楽観的に反映し、確定値は描画ループ上で同じ要素に上書きする。

use std::collections::{HashMap, HashSet};

use ratatui::style::{Color, Modifier, Style};
use tracing::warn;

use crate::diff::{index_files, parse_unified_diff, DiffFile, LineType};
use crate::model::{
    format_timestamp, CommentTarget, LineSide, NotFound, PullRequest, PullRequestComment,
};
use crate::ui::scrollable_page::{Fragment, PageLine, ScrollablePage};

use super::thread::{render_thread, CommentIndex};
use super::types::LineReference;

/// 行番号ガターの幅（コメント枠はここから描く）
pub const GUTTER: u16 = 10;

pub const DIFF_UNAVAILABLE_MESSAGE: &str =
    "Diff is not available locally. Fetch both branches and open the pull request again.";

const DEFAULT_WIDTH: u16 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewPage {
    Status,
    File(String),
}

pub struct ReviewPanel {
    pub pull_request: PullRequest,
    state: ReviewState,
    files: Vec<DiffFile>,
    file_index: HashMap<String, usize>,
    current: ReviewPage,
    pub page: ScrollablePage<LineReference>,
    width: u16,
}

impl ReviewPanel {
    pub fn new(pull_request: PullRequest) -> Self {
        let mut panel = Self {
            pull_request,
            state: ReviewState::Loading,
            files: Vec::new(),
            file_index: HashMap::new(),
            current: ReviewPage::Status,
            page: ScrollablePage::new(),
            width: DEFAULT_WIDTH,
        };
        panel.rerender();
        panel
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn files(&self) -> &[DiffFile] {
        &self.files
    }

    pub fn current_page(&self) -> &ReviewPage {
        &self.current
    }

    /// diff とコメントを受け取り Ready にする。diff が解析できなければ Error。
    ///
    /// 先に届いていたコメントは残し、`comments` と突き合わせる。
    pub fn set_data(
        &mut self,
        pull_request: PullRequest,
        diff: &[u8],
        comments: Vec<PullRequestComment>,
    ) {
        if self.state != ReviewState::Loading {
            return;
        }
        let known = std::mem::take(&mut self.pull_request.comments);
        self.pull_request = pull_request;
        self.pull_request.comments = known;
        self.absorb_comments(comments);

        match parse_unified_diff(diff) {
            Ok(files) => {
                self.file_index = index_files(&files);
                self.files = files;
                self.state = ReviewState::Ready;
            }
            Err(e) => {
                warn!("Failed to parse diff for {}: {}", self.pull_request.url, e);
                self.state = ReviewState::Error(DIFF_UNAVAILABLE_MESSAGE.to_string());
            }
        }
        self.current = ReviewPage::Status;
        self.page.clear();
        self.rerender();
    }

    /// 別に取得したコメントを取り込む。diff の読み込み前後どちらでもよい。
    pub fn merge_comments(&mut self, fetched: Vec<PullRequestComment>) {
        self.absorb_comments(fetched);
        self.rerender();
    }

    /// サーバ側の一覧を正としつつ、手元にしかないもの（保存中・失敗したプレースホルダ）は残す。
    /// 手元で付けた返信先と削除の印は取得結果より優先する。
    fn absorb_comments(&mut self, fetched: Vec<PullRequestComment>) {
        let local = std::mem::take(&mut self.pull_request.comments);
        let mut merged = fetched;
        for comment in &mut merged {
            let Some(mine) = local.iter().find(|c| c.id == comment.id) else {
                continue;
            };
            if !mine.parent_id.is_empty() {
                comment.parent_id = mine.parent_id.clone();
            }
            comment.deleted |= mine.deleted;
            comment.is_being_deleted = mine.is_being_deleted;
        }
        let fetched_ids: HashSet<String> = merged.iter().map(|c| c.id.clone()).collect();
        merged.extend(local.into_iter().filter(|c| !fetched_ids.contains(&c.id)));
        self.pull_request.comments = merged;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        if self.state != ReviewState::Loading {
            return;
        }
        self.state = ReviewState::Error(message.into());
        self.page.clear();
        self.rerender();
    }

    pub fn set_width(&mut self, width: u16) {
        if width != 0 && width != self.width {
            self.width = width;
            self.rerender();
        }
    }

    pub fn show_status_page(&mut self) {
        if self.current != ReviewPage::Status {
            self.current = ReviewPage::Status;
            self.page.clear();
        }
        self.rerender();
    }

    pub fn show_file(&mut self, file_id: &str) -> Result<(), NotFound> {
        let lines = self.prerender_content(file_id)?;
        let page = ReviewPage::File(file_id.to_string());
        if self.current != page {
            self.current = page;
            self.page.clear();
        }
        self.page.set_content(lines);
        Ok(())
    }

    /// 現在のページを作り直す。選択位置は維持してクランプする。
    pub fn rerender(&mut self) {
        let lines = match (&self.state, &self.current) {
            (ReviewState::Loading, _) => vec![PageLine::from_fragment(Fragment::new(
                "Loading diff…",
                Style::default().fg(Color::DarkGray),
            ))],
            (ReviewState::Error(message), _) => vec![PageLine::from_fragment(Fragment::new(
                message.clone(),
                Style::default().fg(Color::Red),
            ))],
            (ReviewState::Ready, ReviewPage::Status) => self.status_page_lines(),
            (ReviewState::Ready, ReviewPage::File(id)) => match self.prerender_content(id) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!("{}", e);
                    Vec::new()
                }
            },
        };
        self.page.set_content(lines);
    }

    /// 1 ファイル分の diff 行を、各行に付いたコメントスレッドと一緒に作る
    pub fn prerender_content(
        &self,
        file_id: &str,
    ) -> Result<Vec<PageLine<LineReference>>, NotFound> {
        let file = self
            .file_index
            .get(file_id)
            .and_then(|&i| self.files.get(i))
            .ok_or_else(|| NotFound::new("file", file_id))?;
        let comments = CommentIndex::new(&self.pull_request.comments);

        let (added, removed) = file.stats();
        let mut lines = vec![PageLine::from_fragment(Fragment::new(
            format!("{} {}", file.kind.badge(), file.display_path()),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .push(
            Fragment::new(
                format!("+{} -{}", added, removed),
                Style::default().fg(Color::DarkGray),
            )
            .right_aligned(),
        )];

        if file.is_binary {
            lines.push(PageLine::from_fragment(Fragment::new(
                "Binary file not shown",
                Style::default().fg(Color::DarkGray),
            )));
            return Ok(lines);
        }
        if file.hunks.is_empty() {
            lines.push(PageLine::from_fragment(Fragment::new(
                "No content changes",
                Style::default().fg(Color::DarkGray),
            )));
        }

        for hunk in &file.hunks {
            lines.push(PageLine::from_fragment(Fragment::new(
                hunk.header.clone(),
                Style::default().fg(Color::Cyan),
            )));

            let mut old_line = hunk.old_start;
            let mut new_line = hunk.new_start;
            for line in &hunk.lines {
                // 文脈行は新旧どちらの側に付いたコメントも表示する
                let (old_no, new_no, key, other_side) = match line.line_type {
                    LineType::Removed => {
                        let old = old_line;
                        old_line += 1;
                        (Some(old), None, (old, 0), None)
                    }
                    LineType::Added => {
                        let new = new_line;
                        new_line += 1;
                        (None, Some(new), (0, new), None)
                    }
                    LineType::Context => {
                        let (old, new) = (old_line, new_line);
                        old_line += 1;
                        new_line += 1;
                        (Some(old), Some(new), (0, new), Some((old, 0)))
                    }
                };

                let line_number = if key.0 != 0 { key.0 } else { key.1 };
                lines.push(
                    diff_row(old_no, new_no, line.line_type, &line.content).with_reference(
                        LineReference::DiffLine {
                            file_path: file.id.clone(),
                            line_number,
                            kind: line.line_type,
                        },
                    ),
                );

                for anchor in std::iter::once(key).chain(other_side) {
                    for thread in comments.threads_at(&file.id, anchor) {
                        render_thread(&thread, GUTTER, self.width, &mut lines);
                    }
                }
            }
        }
        Ok(lines)
    }

    /// ツリーのルートを選んだときの概要ページ
    fn status_page_lines(&self) -> Vec<PageLine<LineReference>> {
        let pr = &self.pull_request;
        let label = Style::default().fg(Color::DarkGray);
        let field = |name: &str, value: String| {
            PageLine::from_fragment(Fragment::new(format!("{:<18}", name), label))
                .push(Fragment::raw(value).at(18))
        };
        let names = |list: &[String]| {
            if list.is_empty() {
                "-".to_string()
            } else {
                list.join(", ")
            }
        };

        let (added, removed) = self
            .files
            .iter()
            .map(DiffFile::stats)
            .fold((0, 0), |acc, s| (acc.0 + s.0, acc.1 + s.1));

        let mut lines = vec![
            PageLine::from_fragment(Fragment::new(
                pr.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .with_reference(LineReference::PullRequest {
                url: pr.url.clone(),
            }),
            PageLine::from_fragment(Fragment::new(pr.url.clone(), label)),
            PageLine::new(),
            field("Repository", pr.repo.to_string()),
            field("Author", pr.author.clone()),
            field("State", pr.state.label().to_string()),
            field(
                "Branches",
                format!("{} → {}", pr.source.name, pr.destination.name),
            ),
            field("Updated", format_timestamp(&pr.updated_at)),
            field("Approved by", names(&pr.approvals)),
            field("Changes requested", names(&pr.change_requests)),
            field("Comments", pr.comment_count.to_string()),
            field(
                "Files",
                format!("{} changed (+{} -{})", self.files.len(), added, removed),
            ),
            PageLine::new(),
            PageLine::from_fragment(Fragment::new(
                "Conversation",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
        ];

        let comments = CommentIndex::new(&pr.comments);
        let threads = comments.general_threads();
        if threads.is_empty() {
            lines.push(PageLine::from_fragment(Fragment::new(
                "No conversation comments",
                label,
            )));
        }
        for thread in threads {
            render_thread(&thread, 0, self.width, &mut lines);
        }
        lines
    }

    pub fn comment(&self, id: &str) -> Option<&PullRequestComment> {
        self.pull_request.comments.iter().find(|c| c.id == id)
    }

    fn comment_mut(&mut self, id: &str) -> Result<&mut PullRequestComment, NotFound> {
        self.pull_request
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| NotFound::new("comment", id))
    }

    /// 選択行から新規コメントの付け先を決める。付けられない行なら None。
    pub fn comment_target(&self) -> Option<CommentTarget> {
        match self.page.selected_reference()? {
            LineReference::DiffLine {
                file_path,
                line_number,
                kind,
            } => Some(CommentTarget::Line {
                file_path: file_path.clone(),
                side: match kind {
                    LineType::Removed => LineSide::Before,
                    _ => LineSide::After,
                },
                line: *line_number,
            }),
            LineReference::Comment(id) => match self.comment(id) {
                Some(c) if c.is_being_stored || c.deleted => {
                    warn!("Cannot reply to comment {} in its current state", id);
                    None
                }
                Some(_) => Some(CommentTarget::Reply {
                    parent_id: id.clone(),
                }),
                None => {
                    warn!("Selected comment {} is not in the pull request", id);
                    None
                }
            },
            other => {
                warn!("Cannot comment on {:?}", other);
                None
            }
        }
    }

    /// 選択中のコメント id（削除対象）
    pub fn selected_comment_id(&self) -> Option<String> {
        match self.page.selected_reference()? {
            LineReference::Comment(id) => Some(id.clone()),
            other => {
                warn!("Selected line is not a comment: {:?}", other);
                None
            }
        }
    }

    /// 楽観的なプレースホルダを追加し、その仮 id を返す
    pub fn add_placeholder(
        &mut self,
        target: &CommentTarget,
        content: &str,
        author: &str,
    ) -> Result<String, NotFound> {
        let mut placeholder = PullRequestComment {
            content: content.to_string(),
            author: author.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_being_stored: true,
            ..Default::default()
        };
        match target {
            CommentTarget::Line {
                file_path,
                side,
                line,
            } => {
                placeholder.file_path = file_path.clone();
                match side {
                    LineSide::Before => placeholder.before_line = *line,
                    LineSide::After => placeholder.after_line = *line,
                }
            }
            CommentTarget::Reply { parent_id } => {
                let parent = self
                    .comment(parent_id)
                    .ok_or_else(|| NotFound::new("comment", parent_id.as_str()))?;
                placeholder.file_path = parent.file_path.clone();
                placeholder.before_line = parent.before_line;
                placeholder.after_line = parent.after_line;
                placeholder.parent_id = parent_id.clone();
            }
        }

        let mut nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        while self.comment(&nanos.to_string()).is_some() {
            nanos += 1;
        }
        placeholder.id = nanos.to_string();

        let id = placeholder.id.clone();
        self.pull_request.comments.push(placeholder);
        self.pull_request.comment_count += 1;
        self.rerender();
        Ok(id)
    }

    /// サーバ確定値でプレースホルダを上書きする。
    ///
    /// GitHub は返信をスレッドの根に付け替えて返すので、親は手元の値を残す。
    pub fn confirm_comment(
        &mut self,
        temp_id: &str,
        confirmed: PullRequestComment,
    ) -> Result<(), NotFound> {
        let comment = self.comment_mut(temp_id)?;
        let parent_id = std::mem::take(&mut comment.parent_id);
        comment.reconcile(confirmed);
        if !parent_id.is_empty() {
            comment.parent_id = parent_id;
        }
        self.rerender();
        Ok(())
    }

    /// 作成に失敗したプレースホルダは削除済みとして残す
    pub fn fail_comment(&mut self, temp_id: &str) -> Result<(), NotFound> {
        let comment = self.comment_mut(temp_id)?;
        comment.is_being_stored = false;
        comment.deleted = true;
        self.pull_request.comment_count = self.pull_request.comment_count.saturating_sub(1);
        self.rerender();
        Ok(())
    }

    pub fn begin_delete(&mut self, id: &str) -> Result<(), NotFound> {
        self.comment_mut(id)?.is_being_deleted = true;
        self.rerender();
        Ok(())
    }

    /// 削除完了。要素は取り除かず `deleted` にする（返信の構造を保つ）
    pub fn finish_delete(&mut self, id: &str, succeeded: bool) -> Result<(), NotFound> {
        let comment = self.comment_mut(id)?;
        comment.is_being_deleted = false;
        if succeeded {
            comment.deleted = true;
            self.pull_request.comment_count = self.pull_request.comment_count.saturating_sub(1);
        }
        self.rerender();
        Ok(())
    }
}

fn diff_row(
    old_no: Option<u32>,
    new_no: Option<u32>,
    line_type: LineType,
    content: &str,
) -> PageLine<LineReference> {
    let number = |n: Option<u32>| n.map(|n| format!("{:>4}", n)).unwrap_or_else(|| " ".repeat(4));
    let (sign, style) = match line_type {
        LineType::Added => ("+", Style::default().fg(Color::Green)),
        LineType::Removed => ("-", Style::default().fg(Color::Red)),
        LineType::Context => (" ", Style::default()),
    };
    let gutter = Style::default().fg(Color::DarkGray);

    PageLine::from_fragment(Fragment::new(number(old_no), gutter))
        .push(Fragment::new(number(new_no), gutter).at(5))
        .push(Fragment::new(format!("{}{}", sign, content.replace('\t', "    ")), style).at(GUTTER))
}
