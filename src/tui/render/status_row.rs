use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, ConfirmAction, Mode};
use crate::util::unicode;

use super::spans_width;

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let dim_style = Style::default().fg(app.theme.dim).bg(bg);

    let (mut spans, hint) = match app.mode {
        Mode::Filter => (
            vec![
                Span::styled(
                    format!("/{}", app.filter_input),
                    Style::default().fg(app.theme.text_bright).bg(bg),
                ),
                Span::styled("\u{258C}", Style::default().fg(app.theme.highlight).bg(bg)), // ▌ cursor
            ],
            "Enter filter  Esc cancel",
        ),
        Mode::Confirm => {
            let prompt = match &app.confirm {
                Some(ConfirmAction::Delete { path, title }) => {
                    format!("delete {} \"{}\" and its subtasks? (y/n)", path, title)
                }
                None => String::new(),
            };
            (
                vec![Span::styled(
                    prompt,
                    Style::default()
                        .fg(app.theme.highlight)
                        .bg(bg)
                        .add_modifier(Modifier::BOLD),
                )],
                "",
            )
        }
        Mode::Navigate | Mode::Form => {
            let mut spans = Vec::new();
            if let Some(status) = &app.status {
                let color = if status.is_error {
                    app.theme.error
                } else {
                    app.theme.text
                };
                spans.push(Span::styled(
                    status.text.clone(),
                    Style::default().fg(color).bg(bg),
                ));
            } else if let Some(filter) = &app.filter {
                // An applied filter stays visible, dimmed
                spans.push(Span::styled(format!("/{}", filter), dim_style));
            }
            let hint = if app.show_key_hints && app.mode == Mode::Navigate {
                "? help  q quit"
            } else {
                ""
            };
            (spans, hint)
        }
    };

    let content_width = spans_width(&spans);
    let hint_width = unicode::display_width(hint);
    if !hint.is_empty() && content_width + hint_width < width {
        let padding = width - content_width - hint_width;
        spans.push(Span::styled(" ".repeat(padding), Style::default().bg(bg)));
        spans.push(Span::styled(hint, dim_style));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}
