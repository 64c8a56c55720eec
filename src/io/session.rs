use std::path::PathBuf;

use crate::io::blob_store::{BlobStore, StoreError};
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::StoreConfig;
use crate::model::node::Node;
use crate::model::path::NodePath;
use crate::ops::seed::seed_tree;
use crate::ops::tree_ops::{TaskTree, TreeError};

/// Error type for opening a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// How the tree was obtained at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid blob was found
    Loaded,
    /// No blob existed; the seed dataset was stored
    Seeded,
    /// No blob existed and seeding is off
    Empty,
    /// A blob existed but failed validation; the session starts empty and
    /// the stored blob is left untouched until the first mutation
    Corrupt(TreeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Clean,
    /// The last save failed every attempt; the next mutation or `flush`
    /// will try again
    Pending,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub key: String,
    pub seed_on_empty: bool,
    pub save_retries: u32,
    /// Where recovery entries go; `None` disables the recovery log
    pub recovery_dir: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default(), None)
    }
}

impl SessionOptions {
    pub fn from_config(config: &StoreConfig, recovery_dir: Option<PathBuf>) -> Self {
        SessionOptions {
            key: config.key.clone(),
            seed_on_empty: config.seed_on_empty,
            save_retries: config.save_retries,
            recovery_dir,
        }
    }
}

/// The single owned tree instance plus its persistence.
///
/// Every successful mutation goes through [`Session::apply`], which saves
/// the post-mutation snapshot before returning.
pub struct Session<S: BlobStore> {
    store: S,
    tree: TaskTree,
    options: SessionOptions,
    dirty: bool,
    last_save_error: Option<String>,
}

impl<S: BlobStore> Session<S> {
    /// Load the persisted tree, or seed/empty it when nothing is stored.
    pub fn open(store: S, options: SessionOptions) -> Result<(Self, LoadOutcome), SessionError> {
        let blob = store.get(&options.key)?;
        let mut session = Session {
            store,
            tree: TaskTree::new(),
            options,
            dirty: false,
            last_save_error: None,
        };

        let outcome = match blob {
            Some(blob) => match TaskTree::deserialize(&blob) {
                Ok(tree) => {
                    session.tree = tree;
                    LoadOutcome::Loaded
                }
                Err(e) => {
                    session.log(
                        RecoveryEntry::new(RecoveryCategory::Corrupt, "stored tree failed validation")
                            .field("Key", session.options.key.clone())
                            .field("Error", e.to_string())
                            .body(blob),
                    );
                    LoadOutcome::Corrupt(e)
                }
            },
            None if session.options.seed_on_empty => {
                session.tree = seed_tree()?;
                session.dirty = true;
                session.save();
                LoadOutcome::Seeded
            }
            None => LoadOutcome::Empty,
        };

        Ok((session, outcome))
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run a tree operation and save if it succeeded. A failed save is
    /// retried later and never fails the operation itself.
    pub fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut TaskTree) -> Result<T, TreeError>,
    ) -> Result<T, TreeError> {
        let value = op(&mut self.tree)?;
        self.dirty = true;
        self.save();
        Ok(value)
    }

    /// Re-read the stored blob so the next mutation builds on what other
    /// writers saved. Call with the workspace lock held. A pending local
    /// save is kept, and so is the tree when nothing is stored. The
    /// inspected node survives if it still exists.
    pub fn reload(&mut self) -> Result<(), SessionError> {
        if self.dirty {
            return Ok(());
        }
        let Some(blob) = self.store.get(&self.options.key)? else {
            return Ok(());
        };
        let mut fresh = TaskTree::deserialize(&blob)?;
        if let Some(path) = self.tree.inspected_id().and_then(|id| fresh.path_of(id)) {
            fresh.select_node(&path)?;
        }
        self.tree = fresh;
        Ok(())
    }

    /// Delete a node and record the removed subtree in the recovery log.
    pub fn delete(&mut self, path: &NodePath) -> Result<Node, TreeError> {
        let removed = self.apply(|tree| tree.delete_node(path))?;
        if let Some(dir) = &self.options.recovery_dir
            && let Ok(json) = serde_json::to_string_pretty(&removed)
        {
            recovery::log_deletion(dir, &path.to_string(), &removed.title, &json);
        }
        Ok(removed)
    }

    /// Move the inspected pointer. Not persisted, so nothing is saved.
    pub fn select(&mut self, path: &NodePath) -> Result<&Node, TreeError> {
        self.tree.select_node(path)
    }

    pub fn clear_inspected(&mut self) {
        self.tree.clear_inspected();
    }

    /// Swap in a whole tree and save it.
    pub fn replace(&mut self, tree: TaskTree) -> SaveStatus {
        self.tree = tree;
        self.dirty = true;
        self.save()
    }

    /// Retry a pending save.
    pub fn flush(&mut self) -> SaveStatus {
        if !self.dirty {
            return SaveStatus::Clean;
        }
        self.save()
    }

    pub fn save_status(&self) -> SaveStatus {
        if self.dirty {
            SaveStatus::Pending
        } else {
            SaveStatus::Clean
        }
    }

    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    fn save(&mut self) -> SaveStatus {
        let blob = match self.tree.serialize() {
            Ok(b) => b,
            Err(e) => {
                self.last_save_error = Some(e.to_string());
                return SaveStatus::Pending;
            }
        };

        let attempts = self.options.save_retries.max(1);
        let mut last_err = None;
        for _ in 0..attempts {
            match self.store.set(&self.options.key, &blob) {
                Ok(()) => {
                    self.dirty = false;
                    self.last_save_error = None;
                    return SaveStatus::Clean;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let message = last_err.map(|e| e.to_string()).unwrap_or_default();
        self.log(
            RecoveryEntry::new(RecoveryCategory::Write, "could not save tree")
                .field("Key", self.options.key.clone())
                .field("Attempts", attempts.to_string())
                .field("Error", message.clone())
                .body(blob),
        );
        self.last_save_error = Some(message);
        SaveStatus::Pending
    }

    fn log(&self, entry: RecoveryEntry) {
        if let Some(dir) = &self.options.recovery_dir {
            recovery::log_recovery(dir, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::blob_store::{FileBlobStore, MemoryBlobStore};
    use crate::io::lock::FileLock;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::node::NodeId;
    use tempfile::TempDir;

    fn no_seed() -> SessionOptions {
        SessionOptions {
            seed_on_empty: false,
            ..SessionOptions::default()
        }
    }

    #[test]
    fn first_open_seeds_and_saves() {
        let (session, outcome) = Session::open(MemoryBlobStore::new(), SessionOptions::default()).unwrap();
        assert_eq!(outcome, LoadOutcome::Seeded);
        assert_eq!(session.tree().tasks().len(), 5);
        let stored = session.store().raw("tasks").unwrap();
        assert_eq!(TaskTree::deserialize(stored).unwrap(), *session.tree());
    }

    #[test]
    fn first_open_without_seed_is_empty_and_unsaved() {
        let (session, outcome) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        assert_eq!(outcome, LoadOutcome::Empty);
        assert!(session.tree().is_empty());
        assert!(session.store().raw("tasks").is_none());
    }

    #[test]
    fn reopen_loads_saved_tree() {
        let (mut session, _) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        session.apply(|t| t.add_task("persist me", None)).unwrap();
        let store = session.store().clone();

        let (reopened, outcome) = Session::open(store, no_seed()).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(reopened.tree(), session.tree());
    }

    #[test]
    fn corrupt_blob_falls_back_to_empty_and_is_logged() {
        let dir = TempDir::new().unwrap();
        let options = SessionOptions {
            recovery_dir: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        };
        let store = MemoryBlobStore::with_blob("tasks", "{\"tasks\": [");
        let (session, outcome) = Session::open(store, options).unwrap();

        assert!(matches!(outcome, LoadOutcome::Corrupt(TreeError::CorruptState(_))));
        assert!(session.tree().is_empty());
        // Not overwritten until something changes
        assert_eq!(session.store().raw("tasks"), Some("{\"tasks\": ["));

        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Corrupt);
        assert_eq!(entries[0].body, "{\"tasks\": [");
    }

    #[test]
    fn failed_operation_does_not_save() {
        let (mut session, _) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        let err = session.apply(|t| t.edit_node(&NodePath::top(0), "x", None));
        assert!(err.is_err());
        assert_eq!(session.store().writes_attempted, 0);
    }

    #[test]
    fn save_retries_until_success() {
        let (mut session, _) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        session.store_mut().fail_next_writes(2);
        session.apply(|t| t.add_task("a", None)).unwrap();
        assert_eq!(session.save_status(), SaveStatus::Clean);
        assert_eq!(session.store().writes_attempted, 3);
        assert!(session.store().raw("tasks").is_some());
    }

    #[test]
    fn exhausted_retries_leave_save_pending_until_flush() {
        let dir = TempDir::new().unwrap();
        let options = SessionOptions {
            seed_on_empty: false,
            save_retries: 2,
            recovery_dir: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        };
        let (mut session, _) = Session::open(MemoryBlobStore::new(), options).unwrap();
        session.store_mut().fail_next_writes(2);

        let id = session.apply(|t| t.add_task("a", None)).unwrap();
        assert_eq!(session.save_status(), SaveStatus::Pending);
        assert!(session.last_save_error().is_some());
        // In-memory state is still readable
        assert!(session.tree().find(id).is_some());

        assert_eq!(session.flush(), SaveStatus::Clean);
        assert!(session.last_save_error().is_none());
        let stored = TaskTree::deserialize(session.store().raw("tasks").unwrap()).unwrap();
        assert_eq!(stored, *session.tree());

        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
    }

    #[test]
    fn delete_logs_removed_subtree() {
        let dir = TempDir::new().unwrap();
        let options = SessionOptions {
            seed_on_empty: false,
            recovery_dir: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        };
        let (mut session, _) = Session::open(MemoryBlobStore::new(), options).unwrap();
        session.apply(|t| t.add_task("parent", None)).unwrap();
        session
            .apply(|t| t.add_subtask(&NodePath::top(0), "child", None))
            .unwrap();

        let removed = session.delete(&NodePath::top(0)).unwrap();
        assert_eq!(removed.children.len(), 1);
        assert!(session.tree().is_empty());

        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries[0].category, RecoveryCategory::Delete);
        assert!(entries[0].body.contains("\"child\""));
    }

    #[test]
    fn select_does_not_save() {
        let (mut session, _) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        session.apply(|t| t.add_task("a", None)).unwrap();
        let writes = session.store().writes_attempted;
        session.select(&NodePath::top(0)).unwrap();
        assert_eq!(session.store().writes_attempted, writes);
        assert_eq!(session.tree().inspected().unwrap().title, "a");
    }

    #[test]
    fn reload_keeps_writes_from_another_session() {
        let dir = TempDir::new().unwrap();
        let open = || Session::open(FileBlobStore::new(dir.path()), no_seed()).unwrap().0;

        let mut long_lived = open();
        {
            let _lock = FileLock::acquire_default(dir.path()).unwrap();
            let mut other = open();
            other.apply(|t| t.add_task("from cli", None)).unwrap();
        }
        {
            let _lock = FileLock::acquire_default(dir.path()).unwrap();
            long_lived.reload().unwrap();
            long_lived.apply(|t| t.add_task("from tui", None)).unwrap();
        }

        let reopened = open();
        let titles: Vec<&str> = reopened
            .tree()
            .tasks()
            .iter()
            .map(|n| n.title.as_str())
            .collect();
        assert_eq!(titles, vec!["from cli", "from tui"]);
        let ids: Vec<NodeId> = reopened.tree().tasks().iter().map(|n| n.id).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn reload_keeps_inspected_node() {
        let (mut session, _) = Session::open(MemoryBlobStore::new(), no_seed()).unwrap();
        session.apply(|t| t.add_task("a", None)).unwrap();
        session.apply(|t| t.add_task("b", None)).unwrap();
        session.select(&NodePath::top(1)).unwrap();

        session.reload().unwrap();
        assert_eq!(session.tree().inspected().map(|n| n.title.as_str()), Some("b"));
    }

    #[test]
    fn reload_does_not_drop_a_pending_save() {
        let options = SessionOptions {
            seed_on_empty: false,
            save_retries: 1,
            ..SessionOptions::default()
        };
        let (mut session, _) = Session::open(MemoryBlobStore::new(), options).unwrap();
        session.apply(|t| t.add_task("saved", None)).unwrap();
        session.store_mut().fail_next_writes(1);
        session.apply(|t| t.add_task("unsaved", None)).unwrap();
        assert_eq!(session.save_status(), SaveStatus::Pending);

        session.reload().unwrap();
        assert_eq!(session.tree().tasks().len(), 2);
    }

    #[test]
    fn reload_refuses_a_corrupt_blob() {
        let store = MemoryBlobStore::with_blob("tasks", "{\"tasks\": [");
        let (mut session, _) = Session::open(store, SessionOptions::default()).unwrap();
        assert!(matches!(
            session.reload(),
            Err(SessionError::Tree(TreeError::CorruptState(_)))
        ));
        assert_eq!(session.store().raw("tasks"), Some("{\"tasks\": ["));
    }
}
