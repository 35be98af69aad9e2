use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::App;

const KEY_WIDTH: usize = 14;

const TABLE_KEYS: &[(&str, &str)] = &[
    ("j/k, Down/Up", "Move selection"),
    ("Ctrl-d/Ctrl-u", "Half page down/up"),
    ("Space", "Toggle selection"),
    ("Enter", "Open review"),
    ("/", "Filter by title (Enter keeps, Esc clears)"),
    ("a", "Approve selected"),
    ("u", "Unapprove selected"),
    ("d", "Decline selected"),
    ("m", "Merge selected"),
    ("r", "Reload all repositories"),
    ("n", "Load next page"),
    ("o", "Open a recently visited repository"),
    ("q", "Quit"),
];

const REVIEW_KEYS: &[(&str, &str)] = &[
    ("Tab", "Switch between file tree and diff"),
    ("j/k, Down/Up", "Move selection"),
    ("Ctrl-d/Ctrl-u", "Half page down/up"),
    ("Enter", "Focus diff for the selected file"),
    ("c", "Comment on line / reply to comment"),
    ("x", "Delete selected comment"),
    ("f", "Jump to file"),
    ("Esc, q", "Back to the table"),
];

/// Format a key display with padding for alignment
fn fmt_key(key: &str, width: usize) -> String {
    format!("  {:<width$}", key, width = width)
}

fn section(title: &'static str, keys: &[(&str, &str)]) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )]),
    ];
    lines.extend(
        keys.iter()
            .map(|(key, description)| Line::from(format!("{}  {}", fmt_key(key, KEY_WIDTH), description))),
    );
    lines
}

fn build_help_lines() -> Vec<Line<'static>> {
    let mut lines = section("Pull Request Table", TABLE_KEYS);
    lines.extend(section("Review", REVIEW_KEYS));
    lines.extend(section(
        "Anywhere",
        &[("?", "Toggle help"), ("Ctrl-c", "Quit")],
    ));
    lines
}

pub fn render(frame: &mut Frame, _app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Help content
        ])
        .split(frame.area());

    let title = Paragraph::new("prt - pull request triage")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(title, chunks[0]);

    let help = Paragraph::new(build_help_lines())
        .block(Block::default().borders(Borders::ALL).title("Keybindings"));
    frame.render_widget(help, chunks[1]);
}
