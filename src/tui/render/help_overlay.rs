use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::App;

use super::centered_rect;

const NAVIGATION: &[(&str, &str)] = &[
    (" \u{2191}\u{2193}/jk", "Move cursor up/down"),
    (" g/G", "Jump to top/bottom"),
    (" Enter", "Expand / collapse"),
    (" \u{2192}/l", "Expand / go to first child"),
    (" \u{2190}/h", "Collapse / go to parent"),
];

const EDITING: &[(&str, &str)] = &[
    (" Space", "Toggle done"),
    (" a", "Add task"),
    (" A", "Add subtask under cursor"),
    (" e", "Edit title and description"),
    (" d", "Delete (asks y/n)"),
];

const OTHER: &[(&str, &str)] = &[
    (" /", "Filter by title"),
    (" Esc", "Clear filter"),
    (" ?", "Toggle this help"),
    (" q", "Quit"),
];

/// Render the help overlay (toggled with ?)
pub fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    // Center the overlay, leaving some margin
    let overlay_area = centered_rect(60, 80, area);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let bg = app.theme.background;
    let key_style = Style::default()
        .fg(app.theme.highlight)
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(app.theme.text).bg(bg);
    let header_style = Style::default()
        .fg(app.theme.text_bright)
        .bg(bg)
        .add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(" Key Bindings", header_style)));

    for (heading, bindings) in [
        (" Navigation", NAVIGATION),
        (" Tasks", EDITING),
        (" Other", OTHER),
    ] {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(heading, header_style)));
        for (key, desc) in bindings {
            add_binding(&mut lines, *key, *desc, key_style, desc_style);
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.dim).bg(bg))
        .style(Style::default().bg(bg));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(bg));

    frame.render_widget(paragraph, overlay_area);
}

fn add_binding<'a>(
    lines: &mut Vec<Line<'a>>,
    key: &'a str,
    desc: &'a str,
    key_style: Style,
    desc_style: Style,
) {
    let key_width = 16;
    let padded_key = format!("{:<width$}", key, width = key_width);
    lines.push(Line::from(vec![
        Span::styled(padded_key, key_style),
        Span::styled(desc, desc_style),
    ]));
}
