use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, RowStatus};

use super::common;

const HINTS: &str =
    "j/k: move | Space: select | Enter: review | a/u/d/m: approve/unapprove/decline/merge | /: filter | ?: help";

pub fn render(frame: &mut Frame, app: &mut App) {
    let filter_bar = app.table_filter.is_some() || !app.table.filter().is_empty();

    let mut constraints = vec![
        Constraint::Length(3), // Header
        Constraint::Min(0),    // Table
    ];
    if filter_bar {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(3)); // Footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let loading = app
        .app_state
        .repositories()
        .filter(|(_, data)| data.loading)
        .count();
    let mut header_text = format!(
        "Pull requests: {} ({})",
        app.repos.len(),
        app.state_filter.display_name()
    );
    if loading > 0 {
        header_text.push_str(&format!("  {} loading {}", app.spinner_char(), loading));
    }
    let header = Paragraph::new(header_text).block(Block::default().borders(Borders::ALL).title("prt"));
    frame.render_widget(header, chunks[0]);

    let selected = app.table.selected_visible().len();
    let title = if selected > 0 {
        format!("Pull Requests ({} selected)", selected)
    } else {
        "Pull Requests".to_string()
    };
    let block = common::panel_block(title, true);
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);
    app.table.page.set_highlight(common::highlight_style());
    frame.render_widget(&mut app.table.page, inner);

    let mut footer_index = 2;
    if filter_bar {
        let (text, style) = match &app.table_filter {
            Some(input) => (format!("/{}▏", input.query()), Style::default().fg(Color::Yellow)),
            None => (
                format!("filter: {} (Esc to clear)", app.table.filter()),
                Style::default().fg(Color::DarkGray),
            ),
        };
        let bar = Paragraph::new(text)
            .style(style)
            .block(Block::default().borders(Borders::ALL).title("Filter"));
        frame.render_widget(bar, chunks[2]);
        footer_index = 3;
    }

    // 失敗した行を選んでいればエラー本文を出す
    let row_error = app.table.selected_row().and_then(|row| match &row.status {
        RowStatus::Error(message) => Some(message.clone()),
        _ => None,
    });
    match row_error {
        Some(message) if app.flash.is_none() => {
            let footer = Paragraph::new(message)
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(footer, chunks[footer_index]);
        }
        _ => common::render_footer(frame, chunks[footer_index], app, HINTS),
    }
}
