use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

/// Log size above which old entries are trimmed on append (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- tasktree recovery log: data that could not be loaded or saved normally.
     View with: tt recovery
     Prune old entries: tt recovery prune
     Safe to delete if empty or stale. -->

---
";

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// A persisted blob failed validation on load
    Corrupt,
    /// A save failed after all retries
    Write,
    /// A subtree was deleted
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Corrupt => write!(f, "corrupt"),
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Delete => write!(f, "delete"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "corrupt" => Some(RecoveryCategory::Corrupt),
            "write" => Some(RecoveryCategory::Write),
            "delete" => Some(RecoveryCategory::Delete),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Markdown block as written to the log
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            let fence = fence_for(&self.body);
            out.push_str(&format!("\n{}text\n", fence));
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push('\n');
        }
        out.push_str("\n---\n");
        out
    }

    /// JSON form for `tt recovery --json`
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "category": self.category.to_string(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

/// A backtick fence longer than any backtick run inside `body`, so a raw
/// blob can never close its own block.
fn fence_for(body: &str) -> String {
    let longest = body.split(|c| c != '`').map(str::len).max().unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// The backtick run that opens a fenced block, e.g. "````" for "````text".
fn opening_fence(line: &str) -> String {
    line.chars().take_while(|&c| c == '`').collect()
}

pub fn recovery_log_path(dir: &Path) -> PathBuf {
    dir.join(".recovery.log")
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry. Failures are reported on stderr and otherwise ignored.
pub fn log_recovery(dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(dir, &entry) {
        eprintln!("warning: could not write to recovery log: {}", e);
    }
}

fn append_entry(dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(dir);

    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        let content = std::fs::read_to_string(&path)?;
        let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
        atomic_write(&path, prune_entries_before(&content, &cutoff).as_bytes())?;
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())?;
    Ok(())
}

/// Record a deleted subtree so it can be restored by hand.
pub fn log_deletion(dir: &Path, path: &str, title: &str, subtree_json: &str) {
    log_recovery(
        dir,
        RecoveryEntry::new(RecoveryCategory::Delete, format!("deleted \"{}\"", title))
            .field("Path", path)
            .body(subtree_json),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read entries, most recent first. `limit` keeps only the newest N.
pub fn read_recovery_entries(dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let content = match std::fs::read_to_string(recovery_log_path(dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

/// Parse `<timestamp> [<category>] <description>` (without the `## `).
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp_str, rest) = header.split_once(" [")?;
    let (category_str, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .ok()?
        .with_timezone(&Utc);
    let category = RecoveryCategory::parse_category(category_str)?;
    Some((timestamp, category, description.to_string()))
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((timestamp, category, description)) =
            line.strip_prefix("## ").and_then(parse_entry_header)
        else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body_lines: Vec<&str> = Vec::new();
        let mut fence: Option<String> = None;
        for line in lines.by_ref() {
            if fence.is_some() {
                if fence.as_deref() == Some(line) {
                    fence = None;
                } else {
                    body_lines.push(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                fence = Some(opening_fence(line));
            } else if let Some((key, value)) = line.trim().split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body: body_lines.join("\n"),
        });
    }

    entries
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Remove entries older than `before` (default: 30 days ago), or all of
/// them. Returns the number of entries removed.
pub fn prune_recovery(dir: &Path, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
    let path = recovery_log_path(dir);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    let original_count = parse_entries(&content).len();

    if all {
        atomic_write(&path, FILE_HEADER.as_bytes())?;
        return Ok(original_count);
    }

    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
    let trimmed = prune_entries_before(&content, &cutoff);
    let remaining = parse_entries(&trimmed).len();
    atomic_write(&path, trimmed.as_bytes())?;
    Ok(original_count - remaining)
}

/// Drop entries stamped before `cutoff`, keeping the file header.
fn prune_entries_before(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut result = String::new();
    let mut current = String::new();
    let mut current_ts: Option<DateTime<Utc>> = None;
    let mut in_header = true;
    let mut fence: Option<String> = None;

    let flush = |current: &mut String, ts: Option<DateTime<Utc>>, result: &mut String| {
        if ts.is_some_and(|t| t >= *cutoff) {
            result.push_str(current);
        }
        current.clear();
    };

    for line in content.lines() {
        if in_header {
            result.push_str(line);
            result.push('\n');
            if line == "---" {
                in_header = false;
            }
            continue;
        }
        if fence.is_some() {
            if fence.as_deref() == Some(line) {
                fence = None;
            }
        } else if line.starts_with("```") {
            fence = Some(opening_fence(line));
        } else if let Some(header) = line.strip_prefix("## ") {
            flush(&mut current, current_ts, &mut result);
            current_ts = parse_entry_header(header).map(|(ts, _, _)| ts);
        }
        current.push_str(line);
        current.push('\n');
    }
    flush(&mut current, current_ts, &mut result);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry_at(ts: DateTime<Utc>, desc: &str) -> RecoveryEntry {
        let mut e = RecoveryEntry::new(RecoveryCategory::Write, desc);
        e.timestamp = ts;
        e
    }

    #[test]
    fn append_and_read_back() {
        let dir = TempDir::new().unwrap();
        log_recovery(
            dir.path(),
            RecoveryEntry::new(RecoveryCategory::Corrupt, "blob failed validation")
                .field("Key", "tasks")
                .body("{\"broken\": \n---\n"),
        );
        log_deletion(dir.path(), "0.1", "Old task", "{\"id\": 4}");

        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, RecoveryCategory::Delete);
        assert_eq!(entries[0].description, "deleted \"Old task\"");
        assert_eq!(entries[0].fields, vec![("Path".into(), "0.1".into())]);
        assert_eq!(entries[1].category, RecoveryCategory::Corrupt);
        assert_eq!(entries[1].body, "{\"broken\": \n---");
        assert_eq!(entries[1].fields, vec![("Key".into(), "tasks".into())]);
    }

    #[test]
    fn header_written_once() {
        let dir = TempDir::new().unwrap();
        log_recovery(dir.path(), RecoveryEntry::new(RecoveryCategory::Write, "a"));
        log_recovery(dir.path(), RecoveryEntry::new(RecoveryCategory::Write, "b"));
        let content = std::fs::read_to_string(recovery_log_path(dir.path())).unwrap();
        assert_eq!(content.matches("tasktree recovery log").count(), 1);
    }

    #[test]
    fn read_limit_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for name in ["one", "two", "three"] {
            log_recovery(dir.path(), RecoveryEntry::new(RecoveryCategory::Write, name));
        }
        let entries = read_recovery_entries(dir.path(), Some(2));
        let names: Vec<&str> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["three", "two"]);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_recovery_entries(dir.path(), None).is_empty());
        assert_eq!(prune_recovery(dir.path(), None, false).unwrap(), 0);
    }

    #[test]
    fn prune_by_age() {
        let dir = TempDir::new().unwrap();
        let old = Utc::now() - chrono::Duration::days(90);
        log_recovery(dir.path(), entry_at(old, "old"));
        log_recovery(dir.path(), entry_at(Utc::now(), "new"));

        assert_eq!(prune_recovery(dir.path(), None, false).unwrap(), 1);
        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "new");
    }

    #[test]
    fn prune_all() {
        let dir = TempDir::new().unwrap();
        log_recovery(dir.path(), RecoveryEntry::new(RecoveryCategory::Write, "a"));
        log_recovery(dir.path(), RecoveryEntry::new(RecoveryCategory::Write, "b"));
        assert_eq!(prune_recovery(dir.path(), None, true).unwrap(), 2);
        assert!(read_recovery_entries(dir.path(), None).is_empty());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.json");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn body_with_fences_and_headings_reads_back_whole() {
        let tmp = TempDir::new().unwrap();
        let body = "first\n```\n## 2020-01-01T00:00:00Z [write] not a header\n````\nlast";
        log_recovery(
            tmp.path(),
            RecoveryEntry::new(RecoveryCategory::Corrupt, "raw blob").body(body),
        );
        log_recovery(tmp.path(), RecoveryEntry::new(RecoveryCategory::Write, "after"));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].body, body);
        assert_eq!(entries[0].description, "after");

        // Pruning by age must not split the body at the fake header
        let cutoff = Utc::now() - chrono::Duration::days(1);
        let removed = prune_recovery(tmp.path(), Some(cutoff), false).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(read_recovery_entries(tmp.path(), None)[1].body, body);
    }
}
