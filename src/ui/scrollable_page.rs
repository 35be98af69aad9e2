//! 仮想化スクロールリスト
//!
//! すべての一覧系パネル（PR テーブル、ファイルツリー、diff、フィルタモーダル）の土台。
//! 表示中の範囲 `[page_offset, page_offset + height)` だけを描画する。
//!
//! 不変条件（すべての変更操作の後で成立する）:
//! - `selected_index` は `[0, len - 1]`（空なら 0）
//! - `page_offset` は `[0, max(0, len - height)]`

use std::ops::Range;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use smallvec::SmallVec;
use unicode_width::UnicodeWidthStr;

/// 選択行が端からこの行数以内に来たらページをずらす
pub const LOOK_AHEAD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

/// 1 行を構成するスタイル付きテキスト片
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub style: Style,
    /// 左寄せなら左端から、右寄せなら右端からの桁数
    pub indent: u16,
    pub align: Align,
}

impl Fragment {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
            indent: 0,
            align: Align::Left,
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(text, Style::default())
    }

    pub fn at(mut self, indent: u16) -> Self {
        self.indent = indent;
        self
    }

    pub fn right_aligned(mut self) -> Self {
        self.align = Align::Right;
        self
    }

    pub fn width(&self) -> u16 {
        self.text.width().min(u16::MAX as usize) as u16
    }
}

/// 描画可能な 1 行と、元のドメインオブジェクトへの参照
#[derive(Debug, Clone, PartialEq)]
pub struct PageLine<R> {
    pub fragments: SmallVec<[Fragment; 4]>,
    pub reference: Option<R>,
}

impl<R> Default for PageLine<R> {
    fn default() -> Self {
        Self {
            fragments: SmallVec::new(),
            reference: None,
        }
    }
}

impl<R> PageLine<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fragment(fragment: Fragment) -> Self {
        let mut line = Self::new();
        line.fragments.push(fragment);
        line
    }

    pub fn with_reference(mut self, reference: R) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn push(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// 左寄せの fragment を連結した文字列（テスト・検索用）
    pub fn plain_text(&self) -> String {
        self.fragments
            .iter()
            .filter(|f| f.align == Align::Left)
            .map(|f| f.text.as_str())
            .collect()
    }
}

pub struct ScrollablePage<R> {
    content: Vec<PageLine<R>>,
    page_offset: usize,
    selected_index: usize,
    /// 最後に描画したビューポートの高さ
    height: usize,
    highlight: Style,
}

impl<R> Default for ScrollablePage<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ScrollablePage<R> {
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            page_offset: 0,
            selected_index: 0,
            height: 0,
            highlight: Style::default().bg(Color::DarkGray),
        }
    }

    pub fn with_highlight(mut self, style: Style) -> Self {
        self.highlight = style;
        self
    }

    pub fn set_highlight(&mut self, style: Style) {
        self.highlight = style;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.page_offset = 0;
        self.selected_index = 0;
        self.height = 0;
    }

    /// 内容を差し替える。選択位置とオフセットは維持したまま再クランプする。
    pub fn set_content(&mut self, content: Vec<PageLine<R>>) -> Option<usize> {
        let before = self.selected_index;
        self.content = content;
        self.clamp();
        self.changed(before)
    }

    pub fn content(&self) -> &[PageLine<R>] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn page_offset(&self) -> usize {
        self.page_offset
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height;
        self.clamp();
    }

    pub fn selected_line(&self) -> Option<&PageLine<R>> {
        self.content.get(self.selected_index)
    }

    /// 選択行の参照。範囲外・参照なしなら None。
    pub fn selected_reference(&self) -> Option<&R> {
        self.selected_line().and_then(|l| l.reference.as_ref())
    }

    pub fn visible_range(&self) -> Range<usize> {
        let end = (self.page_offset + self.height).min(self.content.len());
        self.page_offset.min(end)..end
    }

    /// 先頭から条件に合う最初の行の位置
    pub fn position(&self, predicate: impl Fn(&PageLine<R>) -> bool) -> Option<usize> {
        self.content.iter().position(predicate)
    }

    /// 指定行を選択し、画面内に収まるようにオフセットを調整する
    pub fn select(&mut self, index: usize) -> Option<usize> {
        let before = self.selected_index;
        self.selected_index = index;
        self.clamp();
        self.ensure_visible();
        self.changed(before)
    }

    pub fn scroll_down(&mut self) -> Option<usize> {
        let before = self.selected_index;
        self.clamp();
        if self.content.is_empty() {
            return None;
        }
        self.selected_index = (self.selected_index + 1).min(self.content.len() - 1);
        let margin = self.margin();
        if self.height > 0 && self.selected_index + margin >= self.page_offset + self.height {
            self.page_offset = (self.selected_index + margin + 1).saturating_sub(self.height);
        }
        self.clamp();
        self.changed(before)
    }

    pub fn scroll_up(&mut self) -> Option<usize> {
        let before = self.selected_index;
        self.clamp();
        if self.content.is_empty() {
            return None;
        }
        self.selected_index = self.selected_index.saturating_sub(1);
        let margin = self.margin();
        if self.selected_index < self.page_offset + margin {
            self.page_offset = self.selected_index.saturating_sub(margin);
        }
        self.clamp();
        self.changed(before)
    }

    pub fn scroll_half_page_down(&mut self) -> Option<usize> {
        let before = self.selected_index;
        let step = self.half_page();
        self.page_offset = self.page_offset.saturating_add(step);
        self.selected_index = self.selected_index.saturating_add(step);
        self.clamp();
        self.changed(before)
    }

    pub fn scroll_half_page_up(&mut self) -> Option<usize> {
        let before = self.selected_index;
        let step = self.half_page();
        self.page_offset = self.page_offset.saturating_sub(step);
        self.selected_index = self.selected_index.saturating_sub(step);
        self.clamp();
        self.changed(before)
    }

    fn half_page(&self) -> usize {
        (self.height / 2).max(1)
    }

    /// 低いビューポートでは先読み幅を縮める
    fn margin(&self) -> usize {
        LOOK_AHEAD.min(self.height.saturating_sub(1) / 2)
    }

    fn changed(&self, before: usize) -> Option<usize> {
        (self.selected_index != before).then_some(self.selected_index)
    }

    fn clamp(&mut self) {
        let len = self.content.len();
        if len == 0 {
            self.selected_index = 0;
            self.page_offset = 0;
            return;
        }
        self.selected_index = self.selected_index.min(len - 1);
        self.page_offset = self.page_offset.min(len.saturating_sub(self.height));
    }

    fn ensure_visible(&mut self) {
        if self.selected_index < self.page_offset {
            self.page_offset = self.selected_index;
        } else if self.height > 0 && self.selected_index >= self.page_offset + self.height {
            self.page_offset = self.selected_index + 1 - self.height;
        }
        self.clamp();
    }
}

impl<R> Widget for &mut ScrollablePage<R> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.set_height(area.height as usize);
        self.ensure_visible();
        let range = self.visible_range();
        let selected = self.selected_index;

        for (row, index) in range.enumerate() {
            let y = area.y + row as u16;
            let line = &self.content[index];

            if index == selected {
                buf.set_style(Rect::new(area.x, y, area.width, 1), self.highlight);
            }

            for fragment in &line.fragments {
                if fragment.indent >= area.width {
                    continue;
                }
                let x = match fragment.align {
                    Align::Left => area.x + fragment.indent,
                    Align::Right => {
                        let right = area.right().saturating_sub(fragment.indent);
                        right.saturating_sub(fragment.width()).max(area.x)
                    }
                };
                let max_width = area.right().saturating_sub(x) as usize;
                buf.set_stringn(x, y, &fragment.text, max_width, fragment.style);
            }
        }
    }
}
