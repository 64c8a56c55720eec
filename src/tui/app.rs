use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::io::blob_store::{BlobStore, FileBlobStore};
use crate::io::lock::FileLock;
use crate::io::project_io::{discover_workspace, load_workspace};
use crate::io::session::{LoadOutcome, SaveStatus, Session, SessionError, SessionOptions};
use crate::model::node::{Node, NodeId};
use crate::model::path::NodePath;
use crate::ops::search;
use crate::ops::tree_ops::{TaskTree, TreeError};

use super::input;
use super::render;
use super::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    Filter,
    Form,
    Confirm,
}

/// One visible row of the flattened forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub path: NodePath,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    /// For each ancestor level, whether that ancestor was the last sibling
    pub ancestor_last: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKind {
    AddTask,
    AddSubtask { parent: NodePath },
    Edit { path: NodePath },
}

/// Title/description collector shared by add, add-subtask and edit
#[derive(Debug, Clone)]
pub struct FormState {
    pub kind: FormKind,
    pub title: String,
    pub description: String,
    pub field: FormField,
    /// Byte offset into the active field
    pub cursor: usize,
    /// Validation message from the last submit
    pub error: Option<String>,
}

impl FormState {
    pub fn new(kind: FormKind, title: String, description: String) -> Self {
        let cursor = title.len();
        FormState {
            kind,
            title,
            description,
            field: FormField::Title,
            cursor,
            error: None,
        }
    }

    pub fn heading(&self) -> &'static str {
        match self.kind {
            FormKind::AddTask => "New task",
            FormKind::AddSubtask { .. } => "New subtask",
            FormKind::Edit { .. } => "Edit",
        }
    }

    pub fn active_text(&self) -> &str {
        match self.field {
            FormField::Title => &self.title,
            FormField::Description => &self.description,
        }
    }

    pub fn active_text_mut(&mut self) -> &mut String {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
        }
    }

    pub fn switch_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Title,
        };
        self.cursor = self.active_text().len();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    Delete { path: NodePath, title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    pub session: Session<Box<dyn BlobStore>>,
    /// Workspace directory for .state.json and the lock; `None` keeps the
    /// app off the filesystem
    pub workspace_dir: Option<PathBuf>,
    pub theme: Theme,
    pub show_key_hints: bool,
    pub mode: Mode,
    pub should_quit: bool,
    pub cursor: usize,
    pub scroll_offset: usize,
    /// Applied filter term
    pub filter: Option<String>,
    /// Text being typed in filter mode
    pub filter_input: String,
    pub form: Option<FormState>,
    pub confirm: Option<ConfirmAction>,
    pub show_help: bool,
    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(session: Session<Box<dyn BlobStore>>, theme: Theme) -> Self {
        let mut app = App {
            session,
            workspace_dir: None,
            theme,
            show_key_hints: true,
            mode: Mode::Navigate,
            should_quit: false,
            cursor: 0,
            scroll_offset: 0,
            filter: None,
            filter_input: String::new(),
            form: None,
            confirm: None,
            show_help: false,
            status: None,
        };
        app.sync_inspected();
        app
    }

    pub fn tree(&self) -> &TaskTree {
        self.session.tree()
    }

    // -----------------------------------------------------------------------
    // Flattened view
    // -----------------------------------------------------------------------

    /// Visible rows: filtered top-level tasks, then expanded descendants.
    pub fn flat_items(&self) -> Vec<FlatItem> {
        let tree = self.tree();
        let indices: Vec<usize> = match &self.filter {
            Some(term) => search::filter_tasks(tree, term),
            None => (0..tree.tasks().len()).collect(),
        };

        let mut items = Vec::new();
        let count = indices.len();
        for (n, &i) in indices.iter().enumerate() {
            flatten_node(
                tree,
                &tree.tasks()[i],
                NodePath::top(i),
                n == count - 1,
                &[],
                &mut items,
            );
        }
        items
    }

    pub fn cursor_item(&self) -> Option<FlatItem> {
        self.flat_items().into_iter().nth(self.cursor)
    }

    pub fn cursor_path(&self) -> Option<NodePath> {
        self.cursor_item().map(|item| item.path)
    }

    pub fn clamp_cursor(&mut self) {
        let len = self.flat_items().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Keep the cursor inside `height` visible rows.
    pub fn adjust_scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + height {
            self.scroll_offset = self.cursor + 1 - height;
        }
    }

    /// The inspected node follows the cursor.
    pub fn sync_inspected(&mut self) {
        self.clamp_cursor();
        match self.cursor_path() {
            Some(path) => {
                let _ = self.session.select(&path);
            }
            None => self.session.clear_inspected(),
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.flat_items().len();
        if len == 0 {
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
        self.sync_inspected();
    }

    pub fn jump_to(&mut self, path: &NodePath) {
        if let Some(row) = self.flat_items().iter().position(|item| &item.path == path) {
            self.cursor = row;
        }
        self.sync_inspected();
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Run a tree operation on the node at `target`, holding the workspace
    /// lock from reload through save. Errors land in the status row.
    pub fn run_op<T>(
        &mut self,
        target: &NodePath,
        op: impl FnOnce(&mut TaskTree, &NodePath) -> Result<T, TreeError>,
    ) -> Option<T> {
        let (_lock, path) = match self.lock_fresh(target) {
            Ok(fresh) => fresh,
            Err(msg) => {
                self.set_error(msg);
                return None;
            }
        };
        match self.session.apply(|tree| op(tree, &path)) {
            Ok(value) => {
                self.report_save();
                self.jump_to(&path);
                Some(value)
            }
            Err(e) => {
                self.set_error(e.to_string());
                None
            }
        }
    }

    /// Take the lock and load what other processes saved since the last
    /// write. Returns the guard and `target` re-located by node id, since
    /// their edits can shift positions. The root path passes through as is.
    fn lock_fresh(&mut self, target: &NodePath) -> Result<(Option<FileLock>, NodePath), String> {
        let id = if target.is_root() {
            None
        } else {
            Some(self.tree().resolve(target).map_err(|e| e.to_string())?.id)
        };
        let lock = self.acquire_lock()?;
        self.session.reload().map_err(|e| match e {
            SessionError::Tree(TreeError::CorruptState(_)) => {
                format!("{}; run `tt init --force` to reset the store", e)
            }
            other => other.to_string(),
        })?;
        let path = match id {
            Some(id) => self
                .tree()
                .path_of(id)
                .ok_or_else(|| "that task was deleted by another tt process".to_string())?,
            None => target.clone(),
        };
        Ok((lock, path))
    }

    fn acquire_lock(&self) -> Result<Option<FileLock>, String> {
        match &self.workspace_dir {
            Some(dir) => FileLock::acquire_default(dir)
                .map(Some)
                .map_err(|e| e.to_string()),
            None => Ok(None),
        }
    }

    fn report_save(&mut self) {
        if self.session.save_status() == SaveStatus::Pending {
            let reason = self
                .session
                .last_save_error()
                .unwrap_or("unknown error")
                .to_string();
            self.set_error(format!("not saved, will retry: {}", reason));
        }
    }

    pub fn toggle_completion(&mut self) {
        let Some(path) = self.cursor_path() else {
            return;
        };
        if let Some(done) = self.run_op(&path, |tree, at| tree.toggle_completion(at)) {
            self.set_info(if done { "marked done" } else { "marked not done" });
        }
    }

    pub fn toggle_expansion(&mut self) {
        let Some(item) = self.cursor_item() else {
            return;
        };
        if !item.has_children {
            return;
        }
        self.run_op(&item.path, |tree, at| tree.toggle_expansion(at));
        self.clamp_cursor();
    }

    /// `l`: expand a collapsed parent, or step into its first child.
    pub fn expand_or_descend(&mut self) {
        let Some(item) = self.cursor_item() else {
            return;
        };
        if !item.has_children {
            return;
        }
        if item.is_expanded {
            self.move_cursor(1);
        } else {
            self.run_op(&item.path, |tree, at| tree.toggle_expansion(at));
        }
    }

    /// `h`: collapse an expanded node, or jump to the parent.
    pub fn collapse_or_ascend(&mut self) {
        let Some(item) = self.cursor_item() else {
            return;
        };
        if item.is_expanded {
            self.run_op(&item.path, |tree, at| tree.toggle_expansion(at));
            self.clamp_cursor();
        } else if let Some((parent, _)) = item.path.split_last()
            && !parent.is_root()
        {
            self.jump_to(&parent);
        }
    }

    pub fn request_delete(&mut self) {
        let Some(path) = self.cursor_path() else {
            return;
        };
        let Ok(node) = self.tree().resolve(&path) else {
            return;
        };
        self.confirm = Some(ConfirmAction::Delete {
            title: node.title.clone(),
            path,
        });
        self.mode = Mode::Confirm;
    }

    pub fn confirm_delete(&mut self) {
        let action = self.confirm.take();
        self.mode = Mode::Navigate;
        let Some(ConfirmAction::Delete { path, .. }) = action else {
            return;
        };
        let (_lock, path) = match self.lock_fresh(&path) {
            Ok(fresh) => fresh,
            Err(msg) => {
                self.set_error(msg);
                self.clamp_cursor();
                return;
            }
        };
        match self.session.delete(&path) {
            Ok(removed) => {
                self.set_info(format!("deleted \"{}\"", removed.title));
                self.report_save();
            }
            Err(e) => self.set_error(e.to_string()),
        }
        self.sync_inspected();
    }

    pub fn cancel_confirm(&mut self) {
        self.confirm = None;
        self.mode = Mode::Navigate;
    }

    // -----------------------------------------------------------------------
    // Forms
    // -----------------------------------------------------------------------

    pub fn open_add_task_form(&mut self) {
        self.open_form(FormState::new(FormKind::AddTask, String::new(), String::new()));
    }

    pub fn open_add_subtask_form(&mut self) {
        let Some(parent) = self.cursor_path() else {
            return self.set_error("nothing selected to add a subtask to");
        };
        self.open_form(FormState::new(
            FormKind::AddSubtask { parent },
            String::new(),
            String::new(),
        ));
    }

    pub fn open_edit_form(&mut self) {
        let Some(path) = self.cursor_path() else {
            return;
        };
        let Ok(node) = self.tree().resolve(&path) else {
            return;
        };
        let title = node.title.clone();
        let description = node.description.clone().unwrap_or_default();
        self.open_form(FormState::new(FormKind::Edit { path }, title, description));
    }

    fn open_form(&mut self, form: FormState) {
        self.form = Some(form);
        self.mode = Mode::Form;
    }

    pub fn cancel_form(&mut self) {
        self.form = None;
        self.mode = Mode::Navigate;
    }

    /// Submit the form. On a validation error the form stays open with the
    /// message shown inside it.
    pub fn submit_form(&mut self) {
        let Some(form) = self.form.clone() else {
            return;
        };
        let description = Some(form.description.clone());

        let result = match &form.kind {
            FormKind::AddTask => self.apply_form(&NodePath::root(), |tree, _| {
                tree.add_task(&form.title, description)
            }),
            FormKind::AddSubtask { parent } => self.apply_form(parent, |tree, at| {
                tree.add_subtask(at, &form.title, description)
            }),
            FormKind::Edit { path } => self.apply_form(path, |tree, at| {
                let id = tree.resolve(at)?.id;
                tree.edit_node(at, &form.title, description)?;
                Ok(id)
            }),
        };

        match result.map(|id| self.tree().path_of(id)) {
            Ok(Some(path)) => {
                self.form = None;
                self.mode = Mode::Navigate;
                // Make a new subtask visible under its parent
                if let (FormKind::AddSubtask { .. }, Some((parent, _))) =
                    (&form.kind, path.split_last())
                {
                    self.expand_path(&parent);
                }
                self.jump_to(&path);
            }
            Ok(None) => {
                self.form = None;
                self.mode = Mode::Navigate;
            }
            Err(msg) => {
                if let Some(f) = &mut self.form {
                    f.error = Some(msg);
                }
            }
        }
    }

    fn apply_form(
        &mut self,
        target: &NodePath,
        op: impl FnOnce(&mut TaskTree, &NodePath) -> Result<NodeId, TreeError>,
    ) -> Result<NodeId, String> {
        let (_lock, path) = self.lock_fresh(target)?;
        let value = self
            .session
            .apply(|tree| op(tree, &path))
            .map_err(|e| e.to_string())?;
        self.report_save();
        Ok(value)
    }

    fn expand_path(&mut self, path: &NodePath) {
        let expanded = self
            .tree()
            .resolve(path)
            .is_ok_and(|n| self.tree().is_expanded(n.id));
        if !expanded {
            self.run_op(path, |tree, at| tree.toggle_expansion(at));
        }
    }

    // -----------------------------------------------------------------------
    // Filter
    // -----------------------------------------------------------------------

    pub fn begin_filter(&mut self) {
        self.filter_input = self.filter.clone().unwrap_or_default();
        self.mode = Mode::Filter;
    }

    pub fn apply_filter(&mut self) {
        let term = self.filter_input.trim().to_string();
        self.filter = if term.is_empty() { None } else { Some(term) };
        self.mode = Mode::Navigate;
        self.cursor = 0;
        self.scroll_offset = 0;
        self.sync_inspected();
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.filter_input.clear();
        self.mode = Mode::Navigate;
        self.sync_inspected();
    }

    // -----------------------------------------------------------------------
    // Status row
    // -----------------------------------------------------------------------

    pub fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error: true,
        });
    }
}

fn flatten_node(
    tree: &TaskTree,
    node: &Node,
    path: NodePath,
    is_last: bool,
    ancestor_last: &[bool],
    items: &mut Vec<FlatItem>,
) {
    let has_children = !node.children.is_empty();
    let is_expanded = has_children && tree.is_expanded(node.id);
    items.push(FlatItem {
        path: path.clone(),
        depth: ancestor_last.len(),
        has_children,
        is_expanded,
        is_last_sibling: is_last,
        ancestor_last: ancestor_last.to_vec(),
    });

    if is_expanded {
        let mut child_ancestors = ancestor_last.to_vec();
        child_ancestors.push(is_last);
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            flatten_node(
                tree,
                child,
                path.child(i),
                i == count - 1,
                &child_ancestors,
                items,
            );
        }
    }
}

/// Restore UI state from .state.json
pub fn restore_ui_state(app: &mut App) {
    use crate::io::state::read_ui_state;

    let Some(dir) = &app.workspace_dir else {
        return;
    };
    let Some(ui_state) = read_ui_state(dir) else {
        return;
    };
    app.filter = ui_state.filter.filter(|f| !f.trim().is_empty());
    app.cursor = ui_state.cursor;
    app.scroll_offset = ui_state.scroll_offset;
    app.sync_inspected();
}

/// Save UI state to .state.json
pub fn save_ui_state(app: &App) {
    use crate::io::state::{UiState, write_ui_state};

    let Some(dir) = &app.workspace_dir else {
        return;
    };
    let ui_state = UiState {
        cursor: app.cursor,
        scroll_offset: app.scroll_offset,
        filter: app.filter.clone(),
    };
    let _ = write_ui_state(dir, &ui_state);
}

fn open_app(start: &Path) -> Result<App, Box<dyn std::error::Error>> {
    let root = discover_workspace(start)?;
    let workspace = load_workspace(&root)?;

    let store: Box<dyn BlobStore> = Box::new(FileBlobStore::new(workspace.store_dir()));
    let options =
        SessionOptions::from_config(&workspace.config.store, Some(workspace.dir.clone()));
    let (session, outcome) = {
        let _lock = FileLock::acquire_default(&workspace.dir)?;
        Session::open(store, options)?
    };

    let mut app = App::new(session, Theme::from_config(&workspace.config.ui));
    app.show_key_hints = workspace.config.ui.show_key_hints;
    app.workspace_dir = Some(workspace.dir.clone());
    restore_ui_state(&mut app);

    match outcome {
        LoadOutcome::Corrupt(e) => app.set_error(format!(
            "stored tree unreadable ({}); changes are off until `tt init --force`, original kept in recovery log",
            e
        )),
        LoadOutcome::Seeded => app.set_info("seeded sample tasks"),
        LoadOutcome::Loaded | LoadOutcome::Empty => {}
    }
    Ok(app)
}

/// Run the TUI application
pub fn run(project_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let start = match project_dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    let mut app = open_app(&start)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app);

    // Last chance for a pending save
    if app.session.flush() == SaveStatus::Pending {
        eprintln!(
            "warning: last change was not saved: {}",
            app.session.last_save_error().unwrap_or("unknown error")
        );
    }
    save_ui_state(&app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut save_counter = 0u32;
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(Duration::from_millis(250))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            input::handle_key(app, key);
            // Debounced state save: every ~5 key presses
            save_counter += 1;
            if save_counter >= 5 {
                save_ui_state(app);
                save_counter = 0;
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::blob_store::MemoryBlobStore;
    use crate::tui::render::test_helpers::{app_with_seed, sample_app};
    use pretty_assertions::assert_eq;

    fn paths(app: &App) -> Vec<String> {
        app.flat_items().iter().map(|i| i.path.to_string()).collect()
    }

    #[test]
    fn collapsed_tree_shows_only_top_level() {
        let app = app_with_seed();
        assert_eq!(paths(&app), vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn expanding_reveals_children_in_order() {
        let mut app = app_with_seed();
        app.expand_or_descend();
        assert_eq!(paths(&app), vec!["0", "0.0", "0.1", "0.2", "1", "2", "3", "4"]);
        let items = app.flat_items();
        assert!(items[0].is_expanded);
        assert_eq!(items[1].depth, 1);
        assert!(items[3].is_last_sibling);
    }

    #[test]
    fn h_collapses_then_jumps_to_parent() {
        let mut app = app_with_seed();
        app.expand_or_descend();
        app.expand_or_descend(); // steps into 0.0
        assert_eq!(app.cursor_path(), Some(NodePath::new(vec![0, 0])));
        app.collapse_or_ascend();
        assert_eq!(app.cursor_path(), Some(NodePath::top(0)));
        app.collapse_or_ascend();
        assert_eq!(paths(&app).len(), 5);
    }

    #[test]
    fn cursor_movement_inspects_node() {
        let mut app = app_with_seed();
        app.move_cursor(2);
        let inspected = app.tree().inspected().map(|n| n.title.clone());
        assert_eq!(inspected.as_deref(), Some("Meet with the team"));
        app.move_cursor(10);
        assert_eq!(app.cursor, 4);
        app.move_cursor(-10);
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn toggle_completion_saves() {
        let mut app = sample_app();
        app.toggle_completion();
        let id = app.tree().tasks()[0].id;
        assert!(app.tree().is_completed(id));
        let blob = app.session.store().get("tasks").unwrap().unwrap();
        assert!(TaskTree::deserialize(&blob).unwrap().is_completed(id));
    }

    #[test]
    fn empty_title_keeps_form_open() {
        let mut app = sample_app();
        app.open_add_task_form();
        app.submit_form();
        assert_eq!(app.mode, Mode::Form);
        let msg = app.form.as_ref().and_then(|f| f.error.clone()).unwrap();
        assert!(msg.contains("title"), "{}", msg);
        assert_eq!(app.tree().tasks().len(), 1);
    }

    #[test]
    fn add_subtask_expands_parent_and_selects_child() {
        let mut app = sample_app();
        app.open_add_subtask_form();
        if let Some(form) = &mut app.form {
            form.title = "Child".into();
        }
        app.submit_form();
        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.cursor_path(), Some(NodePath::new(vec![0, 0])));
        assert_eq!(app.tree().inspected().map(|n| n.title.as_str()), Some("Child"));
    }

    #[test]
    fn edit_form_prefills_and_updates() {
        let mut app = sample_app();
        app.open_edit_form();
        let form = app.form.as_mut().unwrap();
        assert_eq!(form.title, "Write report");
        form.title = "Write final report".into();
        app.submit_form();
        assert_eq!(app.tree().tasks()[0].title, "Write final report");
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app_with_seed();
        app.request_delete();
        assert_eq!(app.mode, Mode::Confirm);
        app.cancel_confirm();
        assert_eq!(app.tree().tasks().len(), 5);

        app.request_delete();
        app.confirm_delete();
        assert_eq!(app.tree().tasks().len(), 4);
        assert_eq!(app.tree().tasks()[0].title, "Prepare a report");
    }

    #[test]
    fn filter_limits_rows() {
        let mut app = app_with_seed();
        app.begin_filter();
        app.filter_input = "conclusions".into();
        app.apply_filter();
        assert_eq!(paths(&app), vec!["1"]);
        app.clear_filter();
        assert_eq!(paths(&app).len(), 5);
    }

    #[test]
    fn failed_save_is_reported() {
        let mut store = MemoryBlobStore::new();
        store.fail_next_writes(10);
        let (session, _) = Session::open(
            Box::new(store) as Box<dyn BlobStore>,
            SessionOptions {
                seed_on_empty: false,
                save_retries: 2,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        let mut app = App::new(session, Theme::default());
        app.open_add_task_form();
        app.form.as_mut().unwrap().title = "Task".into();
        app.submit_form();
        let status = app.status.clone().unwrap();
        assert!(status.is_error);
        assert!(status.text.starts_with("not saved"));
        assert_eq!(app.tree().tasks().len(), 1);
    }

    /// An App over a file store in `dir`, the way `run` builds one.
    fn app_on_disk(dir: &Path) -> App {
        let store: Box<dyn BlobStore> = Box::new(FileBlobStore::new(dir));
        let (session, _) = Session::open(store, SessionOptions::default()).unwrap();
        let mut app = App::new(session, Theme::default());
        app.workspace_dir = Some(dir.to_path_buf());
        app
    }

    /// Mutate the stored tree the way a `tt` command does.
    fn write_from_cli(dir: &Path, op: impl FnOnce(&mut TaskTree)) {
        let _lock = FileLock::acquire_default(dir).unwrap();
        let (mut session, _) =
            Session::open(FileBlobStore::new(dir), SessionOptions::default()).unwrap();
        session
            .apply(|tree| {
                op(tree);
                Ok(())
            })
            .unwrap();
    }

    fn stored_tree(dir: &Path) -> TaskTree {
        let blob = FileBlobStore::new(dir).get("tasks").unwrap().unwrap();
        TaskTree::deserialize(&blob).unwrap()
    }

    #[test]
    fn tui_write_keeps_concurrent_cli_write() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut app = app_on_disk(tmp.path());

        write_from_cli(tmp.path(), |tree| {
            tree.add_task("from cli", None).unwrap();
        });
        app.toggle_completion();

        let stored = stored_tree(tmp.path());
        let titles: Vec<&str> = stored.tasks().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles.len(), 6);
        assert_eq!(titles[5], "from cli");
        assert!(stored.is_completed(stored.tasks()[0].id));
        assert_eq!(app.tree(), &stored);
    }

    #[test]
    fn tui_op_follows_node_moved_by_cli() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut app = app_on_disk(tmp.path());
        app.move_cursor(1);
        assert_eq!(app.cursor_path(), Some(NodePath::top(1)));

        write_from_cli(tmp.path(), |tree| {
            tree.delete_node(&NodePath::top(0)).unwrap();
        });
        app.toggle_completion();

        let stored = stored_tree(tmp.path());
        assert_eq!(stored.tasks()[0].title, "Prepare a report");
        assert!(stored.is_completed(stored.tasks()[0].id));
        assert_eq!(app.cursor_path(), Some(NodePath::top(0)));
    }

    #[test]
    fn tui_reports_node_deleted_by_cli() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut app = app_on_disk(tmp.path());

        write_from_cli(tmp.path(), |tree| {
            tree.delete_node(&NodePath::top(0)).unwrap();
        });
        app.toggle_completion();

        let status = app.status.as_ref().unwrap();
        assert!(status.is_error);
        assert!(status.text.contains("deleted by another"), "{}", status.text);
        assert_eq!(stored_tree(tmp.path()).tasks().len(), 4);
    }

    #[test]
    fn corrupt_store_refuses_tui_writes() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("tasks.json"), "{ not json").unwrap();
        let mut app = app_on_disk(tmp.path());

        app.open_add_task_form();
        if let Some(form) = &mut app.form {
            form.title = "New".into();
        }
        app.submit_form();

        let msg = app.form.as_ref().and_then(|f| f.error.clone()).unwrap();
        assert!(msg.contains("tt init --force"), "{}", msg);
        let raw = std::fs::read_to_string(tmp.path().join("tasks.json")).unwrap();
        assert_eq!(raw, "{ not json");
    }
}
