use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;

/// 選択行の背景
pub fn highlight_style() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

/// 枠付きパネルの外枠。フォーカス中は色を変える。
pub fn panel_block(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

/// 一時メッセージ、なければキー操作のヒントを出すフッター
pub fn render_footer(frame: &mut Frame, area: Rect, app: &App, hints: &str) {
    let mut spans = Vec::new();
    if app.is_batch_running() {
        spans.push(Span::styled(
            format!("{} running ", app.spinner_char()),
            Style::default().fg(Color::Yellow),
        ));
    }
    match &app.flash {
        Some(message) => spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Magenta),
        )),
        None => spans.push(Span::styled(
            hints.to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    }
    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}
