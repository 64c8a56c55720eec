use crossterm::event::{KeyCode, KeyEvent};

use crate::tui::app::{App, Mode};

use super::is_text_key;

pub(super) fn handle_filter(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.apply_filter(),
        // Esc abandons the edit; an applied filter stays until Esc in navigate
        KeyCode::Esc => {
            app.filter_input.clear();
            app.mode = Mode::Navigate;
        }
        KeyCode::Backspace => {
            app.filter_input.pop();
        }
        _ => {
            if let Some(c) = is_text_key(&key) {
                app.filter_input.push(c);
            }
        }
    }
}
