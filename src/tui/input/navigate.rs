use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::App;

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) {
    // Help overlay intercepts everything; ? or Esc closes it
    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return;
    }

    // Clear any transient status message on keypress
    app.status = None;

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,

        // Cursor
        KeyCode::Char('j') | KeyCode::Down => app.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_cursor(-1),
        KeyCode::Char('g') | KeyCode::Home => app.move_cursor(isize::MIN),
        KeyCode::Char('G') | KeyCode::End => app.move_cursor(isize::MAX),

        // Expansion
        KeyCode::Enter => app.toggle_expansion(),
        KeyCode::Char('l') | KeyCode::Right => app.expand_or_descend(),
        KeyCode::Char('h') | KeyCode::Left => app.collapse_or_ascend(),

        // Mutations
        KeyCode::Char(' ') => app.toggle_completion(),
        KeyCode::Char('a') => app.open_add_task_form(),
        KeyCode::Char('A') => app.open_add_subtask_form(),
        KeyCode::Char('e') => app.open_edit_form(),
        KeyCode::Char('d') => app.request_delete(),

        // Filter
        KeyCode::Char('/') => app.begin_filter(),
        KeyCode::Esc if app.filter.is_some() => app.clear_filter(),

        _ => {}
    }
}
