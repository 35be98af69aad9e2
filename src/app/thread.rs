//! コメントスレッドの並び順と描画
//!
//! スレッドはトップレベルコメントとその返信を深さ優先でたどった列。
//! 枠線のグリフは「同じスレッドで直前に描いたコメント」との深さの差で決まる。

use std::collections::{HashMap, HashSet};

use ratatui::style::{Color, Modifier, Style};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::model::{format_timestamp, PullRequestComment};
use crate::ui::scrollable_page::{Fragment, PageLine};

use super::types::LineReference;

/// 枠線の左端からコメント本文までの幅
const BODY_OFFSET: u16 = 4;
/// 返信 1 段ごとの字下げ
const DEPTH_INDENT: u16 = 2;

/// コメントの上端グリフ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// 深さ 0: 新しい箱の左上角
    Corner,
    /// 直前より浅い: 深い箱を閉じつつ分岐
    Closing,
    /// 直前と同じ深さ
    Tee,
    /// 直前より深い: 新しい行は作らず直前の行に付け足す
    Reply,
}

impl Border {
    pub fn for_depth(depth: usize, previous: Option<usize>) -> Self {
        match previous {
            _ if depth == 0 => Border::Corner,
            None => Border::Corner,
            Some(prev) if depth < prev => Border::Closing,
            Some(prev) if depth == prev => Border::Tee,
            Some(_) => Border::Reply,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Border::Corner => "╭─",
            Border::Closing => "├╯",
            Border::Tee => "├─",
            Border::Reply => "┬",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThreadEntry<'a> {
    pub comment: &'a PullRequestComment,
    pub depth: usize,
}

/// 親子関係と行キーでコメントを引けるようにした索引
pub struct CommentIndex<'a> {
    comments: &'a [PullRequestComment],
    /// (file_path, (before, after)) → トップレベルコメントの位置
    by_line: HashMap<(&'a str, (u32, u32)), Vec<usize>>,
    /// ファイルに紐付かないトップレベルコメント
    general: Vec<usize>,
    children: HashMap<&'a str, Vec<usize>>,
}

impl<'a> CommentIndex<'a> {
    pub fn new(comments: &'a [PullRequestComment]) -> Self {
        let ids: HashSet<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        let mut by_line: HashMap<(&str, (u32, u32)), Vec<usize>> = HashMap::new();
        let mut general = Vec::new();
        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();

        for (i, comment) in comments.iter().enumerate() {
            // 親が見つからない返信はトップレベル扱い
            if !comment.is_top_level() && ids.contains(comment.parent_id.as_str()) {
                children
                    .entry(comment.parent_id.as_str())
                    .or_default()
                    .push(i);
            } else if comment.is_inline() {
                by_line
                    .entry((comment.file_path.as_str(), comment.line_key()))
                    .or_default()
                    .push(i);
            } else {
                general.push(i);
            }
        }

        Self {
            comments,
            by_line,
            general,
            children,
        }
    }

    /// 指定行に付いたスレッド（トップレベルごとに 1 本）
    pub fn threads_at(&self, file_path: &str, key: (u32, u32)) -> Vec<Vec<ThreadEntry<'a>>> {
        self.by_line
            .get(&(file_path, key))
            .map(|roots| roots.iter().map(|&i| self.thread(i)).collect())
            .unwrap_or_default()
    }

    /// ファイルに紐付かない会話コメントのスレッド
    pub fn general_threads(&self) -> Vec<Vec<ThreadEntry<'a>>> {
        self.general.iter().map(|&i| self.thread(i)).collect()
    }

    pub fn inline_count(&self, file_path: &str) -> usize {
        self.by_line
            .iter()
            .filter(|((path, _), _)| *path == file_path)
            .map(|(_, roots)| roots.len())
            .sum()
    }

    fn thread(&self, root: usize) -> Vec<ThreadEntry<'a>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.walk(root, 0, &mut visited, &mut out);
        out
    }

    fn walk(
        &self,
        index: usize,
        depth: usize,
        visited: &mut HashSet<usize>,
        out: &mut Vec<ThreadEntry<'a>>,
    ) {
        if !visited.insert(index) {
            return;
        }
        let comment = &self.comments[index];
        out.push(ThreadEntry { comment, depth });
        if let Some(replies) = self.children.get(comment.id.as_str()) {
            for &reply in replies {
                self.walk(reply, depth + 1, visited, out);
            }
        }
    }
}

/// 表示幅で単語単位に折り返す。1 単語が幅を超える場合は文字単位で切る。
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            let sep = usize::from(!current.is_empty());
            if current_width + sep + word_width <= width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += sep + word_width;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            if word_width <= width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }
            for ch in word.chars() {
                let w = ch.width().unwrap_or(0);
                if current_width + w > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(ch);
                current_width += w;
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn header_text(comment: &PullRequestComment) -> (String, Style) {
    if comment.deleted {
        ("deleted".to_string(), Style::default().fg(Color::DarkGray))
    } else if comment.is_being_deleted {
        ("deleting…".to_string(), Style::default().fg(Color::Yellow))
    } else if comment.is_being_stored {
        ("saving…".to_string(), Style::default().fg(Color::Yellow))
    } else {
        (
            format!(
                "{} · {}",
                comment.author,
                format_timestamp(&comment.created_at)
            ),
            Style::default().fg(Color::Cyan),
        )
    }
}

/// 1 本のスレッドを行に変換して `out` に追加する
///
/// `base_indent` は diff のガター幅、`width` はパネル全体の幅。
pub fn render_thread(
    thread: &[ThreadEntry<'_>],
    base_indent: u16,
    width: u16,
    out: &mut Vec<PageLine<LineReference>>,
) {
    let border_style = Style::default().fg(Color::DarkGray);
    let mut previous: Option<usize> = None;

    for entry in thread {
        let comment = entry.comment;
        let indent = base_indent + entry.depth as u16 * DEPTH_INDENT;
        let reference = LineReference::Comment(comment.id.clone());
        let border = Border::for_depth(entry.depth, previous);

        let header_glyph = match border {
            Border::Reply => {
                // 直前の行（親コメントの最終行）の本文との隙間に分岐を付ける
                if let Some(last) = out.last_mut() {
                    last.fragments
                        .push(Fragment::new(border.glyph(), border_style).at(indent));
                }
                "╰─"
            }
            other => other.glyph(),
        };

        let (header, header_style) = header_text(comment);
        out.push(
            PageLine::from_fragment(Fragment::new(header_glyph, border_style).at(indent))
                .push(Fragment::new(header, header_style).at(indent + 3))
                .with_reference(reference.clone()),
        );

        let body_width = width.saturating_sub(indent + BODY_OFFSET).max(8) as usize;
        if comment.deleted {
            out.push(
                PageLine::from_fragment(Fragment::new("│", border_style).at(indent))
                    .push(
                        Fragment::new(
                            "comment deleted",
                            Style::default()
                                .fg(Color::DarkGray)
                                .add_modifier(Modifier::CROSSED_OUT),
                        )
                        .at(indent + BODY_OFFSET),
                    )
                    .with_reference(reference.clone()),
            );
        } else {
            for text in wrap_text(&comment.content, body_width) {
                out.push(
                    PageLine::from_fragment(Fragment::new("│", border_style).at(indent))
                        .push(Fragment::raw(text).at(indent + BODY_OFFSET))
                        .with_reference(reference.clone()),
                );
            }
        }
        previous = Some(entry.depth);
    }

    if let Some(last) = thread.last() {
        out.push(
            PageLine::from_fragment(Fragment::new("╰─", border_style).at(base_indent))
                .with_reference(LineReference::Comment(last.comment.id.clone())),
        );
    }
}
