use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::tui::app::App;

/// Render the inspected node: title, path, description and subtask list.
pub fn render_detail_view(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let text_style = Style::default().fg(app.theme.text).bg(bg);
    let bright_style = Style::default().fg(app.theme.text_bright).bg(bg);
    let dim_style = Style::default().fg(app.theme.dim).bg(bg);

    let block = Block::default()
        .borders(Borders::LEFT)
        .border_style(dim_style)
        .style(Style::default().bg(bg));

    let tree = app.tree();
    let Some(node) = tree.inspected() else {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(" Select a task to see its details", dim_style)),
        ])
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let done = tree.is_completed(node.id);
    let mut lines: Vec<Line> = vec![Line::from("")];

    // Title
    let check_color = if done { app.theme.done } else { app.theme.text };
    lines.push(Line::from(vec![
        Span::styled(" ", bright_style),
        Span::styled(
            if done { "[x] " } else { "[ ] " },
            Style::default().fg(check_color).bg(bg),
        ),
        Span::styled(node.title.clone(), bright_style.add_modifier(Modifier::BOLD)),
    ]));

    // Location
    if let Some(path) = tree.path_of(node.id) {
        lines.push(Line::from(Span::styled(
            format!(" {}  {}", path, node.id),
            dim_style,
        )));
    }
    lines.push(Line::from(""));

    // Description
    match &node.description {
        Some(desc) => {
            for line in desc.lines() {
                lines.push(Line::from(Span::styled(format!(" {}", line), text_style)));
            }
        }
        None => lines.push(Line::from(Span::styled(" No description", dim_style))),
    }

    // Subtasks
    if !node.children.is_empty() {
        let (done_children, total) = tree.child_progress(node);
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" Subtasks {}/{}", done_children, total),
            dim_style,
        )));
        for child in &node.children {
            let child_done = tree.is_completed(child.id);
            lines.push(Line::from(vec![
                Span::styled(if child_done { "  [x] " } else { "  [ ] " }, dim_style),
                Span::styled(
                    child.title.clone(),
                    Style::default().fg(app.theme.title_color(child_done)).bg(bg),
                ),
            ]));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
