use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::app::{App, FormField, FormState};
use crate::util::unicode;

use super::centered_fixed;

/// Render the add/edit form as a centered modal
pub fn render_form_popup(frame: &mut Frame, app: &App, area: Rect) {
    let Some(form) = &app.form else {
        return;
    };

    let popup = centered_fixed(70, 9, area);
    frame.render_widget(Clear, popup);

    let bg = app.theme.background;
    let label_style = Style::default().fg(app.theme.dim).bg(bg);
    let active_label_style = Style::default()
        .fg(app.theme.highlight)
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(app.theme.text_bright).bg(bg);
    let inner_width = popup.width.saturating_sub(2) as usize;

    let mut lines = vec![Line::from("")];
    for field in [FormField::Title, FormField::Description] {
        let is_active = form.field == field;
        let label = match field {
            FormField::Title => " Title:       ",
            FormField::Description => " Description: ",
        };
        let mut spans = vec![Span::styled(
            label,
            if is_active { active_label_style } else { label_style },
        )];
        let room = inner_width.saturating_sub(unicode::display_width(label));
        push_field_value(&mut spans, form, field, is_active, room, value_style, app);
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    match &form.error {
        Some(msg) => lines.push(Line::from(Span::styled(
            format!(" {}", msg),
            Style::default().fg(app.theme.error).bg(bg),
        ))),
        None => lines.push(Line::from("")),
    }
    lines.push(Line::from(Span::styled(
        " Tab switch field  Enter save  Esc cancel",
        label_style,
    )));

    let block = Block::default()
        .title(Span::styled(format!(" {} ", form.heading()), active_label_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.dim).bg(bg))
        .style(Style::default().bg(bg));

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, popup);
}

/// Push the field's text, with a block cursor in the active field. Text
/// longer than `room` keeps its tail visible.
fn push_field_value<'a>(
    spans: &mut Vec<Span<'a>>,
    form: &FormState,
    field: FormField,
    is_active: bool,
    room: usize,
    style: Style,
    app: &App,
) {
    let text = match field {
        FormField::Title => &form.title,
        FormField::Description => &form.description,
    };

    if !is_active {
        spans.push(Span::styled(unicode::truncate_to_width(text, room), style));
        return;
    }

    let cursor = form.cursor.min(text.len());
    let (before, after) = text.split_at(cursor);
    let cursor_style = Style::default().fg(app.theme.background).bg(app.theme.highlight);

    // Keep the cursor on screen by dropping leading graphemes
    let mut visible_before = before.to_string();
    while unicode::display_width(&visible_before) + 1 > room {
        match unicode::next_grapheme_boundary(&visible_before, 0) {
            Some(next) if next < visible_before.len() => {
                visible_before.replace_range(..next, "");
            }
            _ => {
                visible_before.clear();
                break;
            }
        }
    }
    spans.push(Span::styled(visible_before.clone(), style));

    let mut rest = after.chars();
    match rest.next() {
        Some(c) => {
            spans.push(Span::styled(c.to_string(), cursor_style));
            let remaining = room.saturating_sub(unicode::display_width(&visible_before) + 1);
            spans.push(Span::styled(
                unicode::truncate_to_width(rest.as_str(), remaining),
                style,
            ));
        }
        None => spans.push(Span::styled(" ", cursor_style)),
    }
}
