use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use regex::Regex;

use crate::model::node::Node;
use crate::tui::app::{App, FlatItem};
use crate::util::unicode;

use super::spans_width;

/// Expansion marker for a row: ▾ expanded, ▸ collapsed, blank for leaves
fn expand_marker(item: &FlatItem) -> &'static str {
    match (item.has_children, item.is_expanded) {
        (false, _) => " ",
        (true, true) => "\u{25BE}",
        (true, false) => "\u{25B8}",
    }
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

/// Render the forest pane
pub fn render_tree_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let flat_items = app.flat_items();
    let visible_height = area.height as usize;

    app.clamp_cursor();
    app.adjust_scroll(visible_height);

    if flat_items.is_empty() {
        let msg = if app.filter.is_some() {
            " no matching tasks"
        } else {
            " No tasks (press a to add one)"
        };
        let empty =
            Paragraph::new(msg).style(Style::default().fg(app.theme.dim).bg(app.theme.background));
        frame.render_widget(empty, area);
        return;
    }

    let filter_re = app
        .filter
        .as_deref()
        .and_then(|term| Regex::new(&format!("(?i){}", regex::escape(term))).ok());

    let scroll = app.scroll_offset.min(flat_items.len().saturating_sub(1));
    let end = flat_items.len().min(scroll + visible_height);
    let mut lines: Vec<Line> = Vec::with_capacity(visible_height);

    for (item, row) in flat_items[scroll..end].iter().zip(scroll..end) {
        let Ok(node) = app.tree().resolve(&item.path) else {
            continue;
        };
        lines.push(render_node_line(
            app,
            node,
            item,
            row == app.cursor,
            area.width as usize,
            filter_re.as_ref(),
        ));
    }

    let paragraph = Paragraph::new(lines).style(Style::default().bg(app.theme.background));
    frame.render_widget(paragraph, area);
}

/// Render a single row with tree connectors, marker, checkbox and title.
fn render_node_line<'a>(
    app: &App,
    node: &Node,
    item: &FlatItem,
    is_cursor: bool,
    width: usize,
    filter_re: Option<&Regex>,
) -> Line<'a> {
    let theme = &app.theme;
    let done = app.tree().is_completed(node.id);
    let row_bg = if is_cursor {
        theme.selection_bg
    } else {
        theme.background
    };
    let dim_style = Style::default().fg(theme.dim).bg(row_bg);

    let mut spans: Vec<Span<'a>> = Vec::new();

    // Column 0: cursor bar
    if is_cursor {
        spans.push(Span::styled(
            "\u{258E}",
            Style::default().fg(theme.highlight).bg(row_bg),
        ));
    } else {
        spans.push(Span::styled(" ", Style::default().bg(row_bg)));
    }

    // Tree connectors for nested rows
    if item.depth > 0 {
        for (d, is_ancestor_last) in item.ancestor_last.iter().enumerate() {
            if d == 0 || *is_ancestor_last {
                spans.push(Span::styled("  ", dim_style));
            } else {
                spans.push(Span::styled("\u{2502} ", dim_style)); // │
            }
        }
        let connector = if item.is_last_sibling {
            "\u{2514}\u{2500}" // └─
        } else {
            "\u{251C}\u{2500}" // ├─
        };
        spans.push(Span::styled(connector, dim_style));
    }

    spans.push(Span::styled(expand_marker(item), dim_style));
    spans.push(Span::styled(" ", dim_style));

    let check_color = if done { theme.done } else { theme.text };
    spans.push(Span::styled(
        checkbox(done),
        Style::default()
            .fg(check_color)
            .bg(row_bg)
            .add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled(" ", dim_style));

    // Progress suffix for parents
    let suffix = if node.children.is_empty() {
        String::new()
    } else {
        let (done_children, total) = app.tree().child_progress(node);
        format!(" ({}/{})", done_children, total)
    };

    // Title, truncated to what is left of the row
    let used = spans_width(&spans) + unicode::display_width(&suffix);
    let title = unicode::truncate_to_width(&node.title, width.saturating_sub(used));
    let mut title_style = Style::default().fg(theme.title_color(done)).bg(row_bg);
    if done {
        title_style = title_style.add_modifier(Modifier::CROSSED_OUT);
    } else if is_cursor {
        title_style = title_style.fg(theme.text_bright);
    }
    let match_style = Style::default()
        .fg(theme.background)
        .bg(theme.highlight);
    push_highlighted_spans(&mut spans, &title, title_style, match_style, filter_re);

    if !suffix.is_empty() {
        spans.push(Span::styled(suffix, dim_style));
    }

    // Fill the rest of the cursor row
    let fill = width.saturating_sub(spans_width(&spans));
    if fill > 0 {
        spans.push(Span::styled(" ".repeat(fill), Style::default().bg(row_bg)));
    }

    Line::from(spans)
}

/// Push spans for text with regex match highlighting. If no regex or no matches,
/// pushes a single span with `base_style`. Otherwise splits text at match boundaries.
fn push_highlighted_spans<'a>(
    spans: &mut Vec<Span<'a>>,
    text: &str,
    base_style: Style,
    highlight_style: Style,
    search_re: Option<&Regex>,
) {
    let re = match search_re {
        Some(r) => r,
        None => {
            spans.push(Span::styled(text.to_string(), base_style));
            return;
        }
    };

    let mut last_end = 0;
    for m in re.find_iter(text) {
        if m.start() > last_end {
            spans.push(Span::styled(
                text[last_end..m.start()].to_string(),
                base_style,
            ));
        }
        spans.push(Span::styled(
            text[m.start()..m.end()].to_string(),
            highlight_style,
        ));
        last_end = m.end();
    }
    if last_end < text.len() || text.is_empty() {
        spans.push(Span::styled(text[last_end..].to_string(), base_style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::{app_with_seed, render_to_string};

    #[test]
    fn collapsed_rows_show_markers_and_progress() {
        let mut app = app_with_seed();
        let out = render_to_string(60, 8, |frame, area| {
            render_tree_view(frame, &mut app, area);
        });
        assert!(out.contains("\u{25B8} [ ] Finish the project (0/3)"), "{}", out);
        assert!(out.contains("  [ ] Meet with the team"), "{}", out);
    }

    #[test]
    fn expanded_rows_use_connectors() {
        let mut app = app_with_seed();
        app.expand_or_descend();
        app.move_cursor(1);
        app.toggle_completion();
        let out = render_to_string(60, 10, |frame, area| {
            render_tree_view(frame, &mut app, area);
        });
        assert!(out.contains("\u{25BE} [ ] Finish the project (1/3)"), "{}", out);
        assert!(out.contains("\u{251C}\u{2500}  [x] Write the code"), "{}", out);
        assert!(out.contains("\u{2514}\u{2500}  [ ] Prepare documentation"), "{}", out);
    }

    #[test]
    fn scrolls_to_keep_cursor_visible() {
        let mut app = app_with_seed();
        app.move_cursor(4);
        let out = render_to_string(60, 2, |frame, area| {
            render_tree_view(frame, &mut app, area);
        });
        assert!(out.contains("Update documentation"), "{}", out);
        assert!(!out.contains("Finish the project"), "{}", out);
        assert_eq!(app.scroll_offset, 3);
    }

    #[test]
    fn empty_tree_hint() {
        let mut app = crate::tui::render::test_helpers::empty_app();
        let out = render_to_string(40, 3, |frame, area| {
            render_tree_view(frame, &mut app, area);
        });
        assert!(out.contains("No tasks"), "{}", out);
    }
}
