use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;

use crate::io::blob_store::{BlobStore, MemoryBlobStore};
use crate::io::session::{Session, SessionOptions};
use crate::model::path::NodePath;
use crate::ops::tree_ops::TaskTree;
use crate::tui::app::App;
use crate::tui::theme::Theme;

pub const TERM_W: u16 = 80;
pub const TERM_H: u16 = 24;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

fn app_from_store(store: MemoryBlobStore, seed_on_empty: bool) -> App {
    let options = SessionOptions {
        seed_on_empty,
        ..SessionOptions::default()
    };
    let (session, _) = Session::open(Box::new(store) as Box<dyn BlobStore>, options).unwrap();
    App::new(session, Theme::default())
}

/// An App over the seed dataset, everything collapsed.
pub fn app_with_seed() -> App {
    app_from_store(MemoryBlobStore::new(), true)
}

/// An App over an empty forest.
pub fn empty_app() -> App {
    app_from_store(MemoryBlobStore::new(), false)
}

/// One task, "Write report", with a description and no subtasks.
pub fn sample_app() -> App {
    let mut tree = TaskTree::new();
    tree.add_task("Write report", Some("quarterly".into())).unwrap();
    let blob = tree.serialize().unwrap();
    let app = app_from_store(MemoryBlobStore::with_blob("tasks", &blob), true);
    assert_eq!(app.tree().resolve(&NodePath::top(0)).unwrap().title, "Write report");
    app
}
