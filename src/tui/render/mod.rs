pub mod detail_view;
pub mod form_popup;
pub mod help_overlay;
pub mod status_row;
pub mod tree_view;

#[cfg(test)]
pub mod test_helpers;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::Block;

use crate::util::unicode;

use super::app::{App, Mode};

/// Main render function: dispatches to sub-renderers
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Background fill
    let bg_style = Style::default().bg(app.theme.background);
    frame.render_widget(Block::default().style(bg_style), area);

    // Layout: content | status row (1 row)
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    // Content: tree pane | detail pane
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);

    tree_view::render_tree_view(frame, app, panes[0]);
    detail_view::render_detail_view(frame, app, panes[1]);

    if app.mode == Mode::Form {
        form_popup::render_form_popup(frame, app, area);
    }

    // Help overlay (rendered on top of everything)
    if app.show_help {
        help_overlay::render_help_overlay(frame, app, area);
    }

    status_row::render_status_row(frame, app, rows[1]);
}

/// Compute total display width of a slice of spans
pub(super) fn spans_width(spans: &[Span]) -> usize {
    spans
        .iter()
        .map(|s| unicode::display_width(&s.content))
        .sum()
}

/// Create a centered rectangle of the given percentage of the parent
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// A rectangle of fixed height, `percent_x` wide, centered in `area`
pub(super) fn centered_fixed(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    centered_rect(percent_x, 100, vertical[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::{TERM_H, TERM_W, app_with_seed, render_to_string};

    #[test]
    fn full_frame_has_both_panes_and_status() {
        let mut app = app_with_seed();
        let out = render_to_string(TERM_W, TERM_H, |frame, _| render(frame, &mut app));
        let first_rows: Vec<&str> = out.lines().take(3).collect();
        assert!(first_rows[0].contains("Finish the project"), "{}", out);
        // Detail pane repeats the inspected title
        assert_eq!(out.matches("Finish the project").count(), 2, "{}", out);
        assert!(out.lines().last().unwrap_or("").ends_with("q quit"), "{}", out);
    }

    #[test]
    fn form_draws_over_panes() {
        let mut app = app_with_seed();
        app.open_add_task_form();
        let out = render_to_string(TERM_W, TERM_H, |frame, _| render(frame, &mut app));
        assert!(out.contains("New task"), "{}", out);
        assert!(out.contains("Title:"), "{}", out);
    }
}
