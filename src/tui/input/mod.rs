mod confirm;
mod filter;
mod form;
mod navigate;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Mode};

use confirm::handle_confirm;
use filter::handle_filter;
use form::handle_form;
use navigate::handle_navigate;

/// Handle a key event in the current mode
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }

    // Ctrl+C always quits, even mid-form
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    let key = normalize_key(key);
    match app.mode {
        Mode::Navigate => handle_navigate(app, key),
        Mode::Filter => handle_filter(app, key),
        Mode::Form => handle_form(app, key),
        Mode::Confirm => handle_confirm(app, key),
    }
}

/// Shifted counterpart of a base symbol on a US layout
fn shift_symbol(c: char) -> Option<char> {
    match c {
        '/' => Some('?'),
        ';' => Some(':'),
        '.' => Some('>'),
        ',' => Some('<'),
        _ => None,
    }
}

/// Normalize key events from terminals using the kitty keyboard protocol.
///
/// Kitty protocol sends `Char(lowercase) + SHIFT` instead of `Char(UPPERCASE) + SHIFT`,
/// and `Char(base_symbol) + SHIFT` instead of `Char(shifted_symbol)`.
/// Traditional terminals already send the shifted character, so this is a no-op there.
fn normalize_key(mut key: KeyEvent) -> KeyEvent {
    if let KeyCode::Char(c) = key.code
        && key.modifiers.contains(KeyModifiers::SHIFT)
    {
        if c.is_ascii_lowercase() {
            key.code = KeyCode::Char(c.to_ascii_uppercase());
        } else if let Some(shifted) = shift_symbol(c) {
            key.code = KeyCode::Char(shifted);
            key.modifiers.remove(KeyModifiers::SHIFT);
        }
    }
    key
}

/// Whether a key should insert text (plain or shifted character)
fn is_text_key(key: &KeyEvent) -> Option<char> {
    match (key.modifiers, key.code) {
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::{app_with_seed, sample_app};
    use pretty_assertions::assert_eq;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn kitty_shift_is_normalized() {
        let key = normalize_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::SHIFT));
        assert_eq!(key.code, KeyCode::Char('A'));
        let key = normalize_key(KeyEvent::new(KeyCode::Char('/'), KeyModifiers::SHIFT));
        assert_eq!(key.code, KeyCode::Char('?'));
        assert_eq!(key.modifiers, KeyModifiers::NONE);
    }

    #[test]
    fn navigate_keys_move_and_quit() {
        let mut app = app_with_seed();
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Down);
        assert_eq!(app.cursor, 2);
        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.cursor, 1);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn space_toggles_and_enter_expands() {
        let mut app = app_with_seed();
        press(&mut app, KeyCode::Char(' '));
        let id = app.tree().tasks()[0].id;
        assert!(app.tree().is_completed(id));

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.flat_items().len(), 8);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.flat_items().len(), 5);
    }

    #[test]
    fn add_task_through_form() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.mode, Mode::Form);
        type_str(&mut app, "Call Bob");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "about the report");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Navigate);
        let task = &app.tree().tasks()[1];
        assert_eq!(task.title, "Call Bob");
        assert_eq!(task.description.as_deref(), Some("about the report"));
        assert_eq!(app.cursor, 1);
    }

    #[test]
    fn form_editing_keys() {
        let mut app = sample_app();
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "Tsk");
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        type_str(&mut app, "a");
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.form.as_ref().unwrap().title, "Tas");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.tree().tasks().len(), 1);
    }

    #[test]
    fn delete_with_confirm_keys() {
        let mut app = app_with_seed();
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.tree().tasks().len(), 5);
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.tree().tasks().len(), 4);
    }

    #[test]
    fn filter_typing_and_escape() {
        let mut app = app_with_seed();
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "review");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.filter.as_deref(), Some("review"));
        assert_eq!(app.flat_items().len(), 1);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.filter, None);
        assert_eq!(app.flat_items().len(), 5);
    }

    #[test]
    fn help_overlay_swallows_keys() {
        let mut app = app_with_seed();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.cursor, 0);
        press(&mut app, KeyCode::Esc);
        assert!(!app.show_help);
    }
}
