use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::review::{ReviewPage, ReviewState};
use crate::app::{App, ReviewFocus};

use super::common;

const HINTS: &str =
    "Tab: switch pane | j/k: move | c: comment/reply | x: delete | f: jump to file | Esc: back | ?: help";

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(frame.area());
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[0]);

    let spinner = app.spinner_char().to_string();
    if let Some(view) = app.review.as_mut() {
        let tree_title = format!("Files ({})", view.panel.files().len());
        let block = common::panel_block(tree_title, view.focus == ReviewFocus::Tree);
        let inner = block.inner(panes[0]);
        frame.render_widget(block, panes[0]);
        view.tree.page.set_highlight(common::highlight_style());
        frame.render_widget(&mut view.tree.page, inner);

        let diff_title = match (view.panel.state(), view.panel.current_page()) {
            (ReviewState::Loading, _) => format!("{} #{}", spinner, view.panel.pull_request.id),
            (ReviewState::Error(_), _) => format!("#{} (unavailable)", view.panel.pull_request.id),
            (ReviewState::Ready, ReviewPage::Status) => {
                format!("#{} {}", view.panel.pull_request.id, view.panel.pull_request.title)
            }
            (ReviewState::Ready, ReviewPage::File(id)) => id.clone(),
        };
        let block = common::panel_block(diff_title, view.focus == ReviewFocus::Diff);
        let inner = block.inner(panes[1]);
        frame.render_widget(block, panes[1]);
        // 折り返し幅が変わればスレッドを組み直す
        view.panel.set_width(inner.width);
        view.panel.page.set_highlight(common::highlight_style());
        frame.render_widget(&mut view.panel.page, inner);
    }

    common::render_footer(frame, chunks[1], app, HINTS);
}
