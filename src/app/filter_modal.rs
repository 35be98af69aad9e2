use ratatui::style::{Color, Style};

use crate::filter::{matches_query, QueryInput};
use crate::ui::scrollable_page::{Fragment, PageLine, ScrollablePage};

use super::types::LineReference;

/// 部分一致で絞り込めるオーバーレイのリスト
pub struct FilterModal {
    pub title: String,
    items: Vec<String>,
    input: QueryInput,
    pub page: ScrollablePage<LineReference>,
}

impl FilterModal {
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        let mut modal = Self {
            title: title.into(),
            items,
            input: QueryInput::new(),
            page: ScrollablePage::new(),
        };
        modal.refilter();
        modal
    }

    pub fn query(&self) -> &str {
        self.input.query()
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert_char(c);
        self.refilter();
    }

    pub fn delete_char(&mut self) {
        self.input.delete_char();
        self.refilter();
    }

    pub fn clear_query(&mut self) {
        self.input.clear();
        self.refilter();
    }

    pub fn match_count(&self) -> usize {
        self.page
            .content()
            .iter()
            .filter(|l| l.reference.is_some())
            .count()
    }

    /// 選択中の項目（元リストでの位置と文字列）
    pub fn selected_item(&self) -> Option<(usize, &str)> {
        match self.page.selected_reference()? {
            LineReference::FilterItem(i) => self.items.get(*i).map(|s| (*i, s.as_str())),
            _ => None,
        }
    }

    fn refilter(&mut self) {
        let query = self.input.query();
        let lines = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| matches_query(item, query))
            .map(|(i, item)| {
                PageLine::from_fragment(Fragment::raw(item.clone()).at(1))
                    .with_reference(LineReference::FilterItem(i))
            })
            .collect::<Vec<_>>();
        if lines.is_empty() && !self.items.is_empty() {
            self.page.set_content(vec![PageLine::from_fragment(
                Fragment::new("No matches", Style::default().fg(Color::DarkGray)).at(1),
            )]);
            return;
        }
        self.page.set_content(lines);
        self.page.select(0);
    }
}
