use crossterm::event::{KeyCode, KeyEvent};

use crate::tui::app::App;
use crate::util::unicode::{next_grapheme_boundary, prev_grapheme_boundary};

use super::is_text_key;

pub(super) fn handle_form(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => return app.cancel_form(),
        KeyCode::Enter => return app.submit_form(),
        _ => {}
    }

    let Some(form) = &mut app.form else {
        return;
    };

    match key.code {
        KeyCode::Tab | KeyCode::BackTab => form.switch_field(),
        KeyCode::Left => {
            if let Some(pos) = prev_grapheme_boundary(form.active_text(), form.cursor) {
                form.cursor = pos;
            }
        }
        KeyCode::Right => {
            if let Some(pos) = next_grapheme_boundary(form.active_text(), form.cursor) {
                form.cursor = pos;
            }
        }
        KeyCode::Home => form.cursor = 0,
        KeyCode::End => form.cursor = form.active_text().len(),
        KeyCode::Backspace => {
            if let Some(pos) = prev_grapheme_boundary(form.active_text(), form.cursor) {
                let end = form.cursor;
                form.active_text_mut().replace_range(pos..end, "");
                form.cursor = pos;
            }
        }
        KeyCode::Delete => {
            if let Some(end) = next_grapheme_boundary(form.active_text(), form.cursor) {
                let start = form.cursor;
                form.active_text_mut().replace_range(start..end, "");
            }
        }
        _ => {
            if let Some(c) = is_text_key(&key) {
                let at = form.cursor;
                form.active_text_mut().insert(at, c);
                form.cursor += c.len_utf8();
                form.error = None;
            }
        }
    }
}
