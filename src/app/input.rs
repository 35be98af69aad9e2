use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::filter::QueryInput;

use super::types::*;
use super::App;

impl App {
    pub(crate) fn handle_input(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                // Kitty keyboard protocol では Release/Repeat も届くので Press のみ処理する
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        // 次のキー入力で一時メッセージを消す
        self.flash = None;

        if self.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }
        if self.table_filter.is_some() {
            self.handle_table_filter_key(key);
            return;
        }
        match self.screen {
            Screen::Table => self.handle_table_key(key),
            Screen::Review => self.handle_review_key(key),
            Screen::Help => self.handle_help_key(key),
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.modal = None,
            KeyCode::Enter => self.confirm_modal(),
            _ => {
                let Some((modal, _)) = self.modal.as_mut() else {
                    return;
                };
                match key.code {
                    KeyCode::Down => {
                        modal.page.scroll_down();
                    }
                    KeyCode::Char('n') if ctrl => {
                        modal.page.scroll_down();
                    }
                    KeyCode::Up => {
                        modal.page.scroll_up();
                    }
                    KeyCode::Char('p') if ctrl => {
                        modal.page.scroll_up();
                    }
                    KeyCode::Char('u') if ctrl => modal.clear_query(),
                    KeyCode::Backspace => modal.delete_char(),
                    KeyCode::Char(c) if !ctrl => modal.insert_char(c),
                    _ => {}
                }
            }
        }
    }

    /// 入力はその場でテーブルに反映する
    fn handle_table_filter_key(&mut self, key: KeyEvent) {
        let Some(input) = self.table_filter.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Enter => {
                self.table_filter = None;
                return;
            }
            KeyCode::Esc => {
                self.table_filter = None;
                self.table.apply_filter("");
                return;
            }
            KeyCode::Backspace => input.delete_char(),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => input.clear(),
            KeyCode::Char(c) => input.insert_char(c),
            _ => return,
        }
        let query = input.query().to_string();
        self.table.apply_filter(&query);
    }

    fn handle_table_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => {
                self.table.page.scroll_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.table.page.scroll_up();
            }
            KeyCode::Char('d') if ctrl => {
                self.table.page.scroll_half_page_down();
            }
            KeyCode::Char('u') if ctrl => {
                self.table.page.scroll_half_page_up();
            }
            KeyCode::Char(' ') => {
                self.table.toggle_current();
            }
            KeyCode::Enter => {
                if let Some(row) = self.table.selected_row() {
                    let descriptor = row.pull_request.descriptor();
                    self.publish(Topic::OpenReview, BusEvent::Review(descriptor));
                }
            }
            KeyCode::Char('/') => {
                let mut input = QueryInput::new();
                for c in self.table.filter().chars() {
                    input.insert_char(c);
                }
                self.table_filter = Some(input);
            }
            KeyCode::Esc => self.table.apply_filter(""),
            KeyCode::Char('a') => self.start_bulk_action(BulkAction::Approve),
            KeyCode::Char('u') => self.start_bulk_action(BulkAction::Unapprove),
            KeyCode::Char('d') => self.start_bulk_action(BulkAction::Decline),
            KeyCode::Char('m') => self.start_bulk_action(BulkAction::Merge),
            KeyCode::Char('r') => self.load_repositories(),
            KeyCode::Char('n') => self.load_next_pages(),
            KeyCode::Char('o') => self.open_repository_picker(),
            KeyCode::Char('?') => self.show_help(),
            _ => {}
        }
    }

    fn handle_review_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.publish(Topic::CloseReview, BusEvent::Empty);
                return;
            }
            KeyCode::Char('?') => {
                self.show_help();
                return;
            }
            KeyCode::Char('c') => {
                self.request_comment();
                return;
            }
            KeyCode::Char('x') => {
                self.delete_selected_comment();
                return;
            }
            KeyCode::Char('f') => {
                self.open_jump_to_file();
                return;
            }
            _ => {}
        }

        let Some(view) = self.review.as_mut() else {
            return;
        };
        match (view.focus, key.code) {
            (_, KeyCode::Tab) => {
                view.focus = match view.focus {
                    ReviewFocus::Tree => ReviewFocus::Diff,
                    ReviewFocus::Diff => ReviewFocus::Tree,
                };
            }
            (ReviewFocus::Tree, code) => {
                let moved = match code {
                    KeyCode::Char('j') | KeyCode::Down => view.tree.page.scroll_down(),
                    KeyCode::Char('k') | KeyCode::Up => view.tree.page.scroll_up(),
                    KeyCode::Char('d') if ctrl => view.tree.page.scroll_half_page_down(),
                    KeyCode::Char('u') if ctrl => view.tree.page.scroll_half_page_up(),
                    KeyCode::Enter => {
                        if matches!(
                            view.tree.page.selected_reference(),
                            Some(LineReference::TreeFile(_))
                        ) {
                            view.focus = ReviewFocus::Diff;
                        }
                        None
                    }
                    _ => None,
                };
                if let Some(index) = moved {
                    self.publish(Topic::TreeSelectionChanged, BusEvent::Index(index));
                }
            }
            (ReviewFocus::Diff, code) => {
                let page = &mut view.panel.page;
                match code {
                    KeyCode::Char('j') | KeyCode::Down => {
                        page.scroll_down();
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        page.scroll_up();
                    }
                    KeyCode::Char('d') if ctrl => {
                        page.scroll_half_page_down();
                    }
                    KeyCode::Char('u') if ctrl => {
                        page.scroll_half_page_up();
                    }
                    _ => {}
                }
            }
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        if matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Esc
        ) {
            self.screen = self.previous_screen;
        }
    }

    fn show_help(&mut self) {
        self.previous_screen = self.screen;
        self.screen = Screen::Help;
    }
}
