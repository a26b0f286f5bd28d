//! Operator-facing activity log.
//!
//! Append-only record of what the panel did: extension lifecycle changes,
//! terminal commands, proxy calls. Stored as JSON Lines so each append is a
//! single write at the end of the file.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::error::Result;

/// Outcome category of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityStatus::Info => "info",
            ActivityStatus::Success => "success",
            ActivityStatus::Warning => "warning",
            ActivityStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single immutable activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: String,
    pub details: String,
    pub status: ActivityStatus,
    pub timestamp: DateTime<Local>,
}

impl ActivityEntry {
    pub fn new(action: impl Into<String>, details: impl Into<String>, status: ActivityStatus) -> Self {
        Self {
            action: action.into(),
            details: details.into(),
            status,
            timestamp: Local::now(),
        }
    }
}

/// Activity log store
///
/// Entries are kept in memory for reads and appended to the backing file one
/// line at a time. A store without a path is memory-only. The open file and
/// the entries share one lock, so file order always matches memory order.
#[derive(Debug)]
pub struct ActivityLog {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    file: Option<File>,
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    /// Open (or create) a log file, loading existing entries.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(content) => parse_lines(&content, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path: Some(path),
            inner: Mutex::new(Inner {
                file: Some(file),
                entries,
            }),
        })
    }

    /// Log that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append an entry. Persistence failures are reported via tracing only.
    pub fn append(&self, action: &str, details: impl Into<String>, status: ActivityStatus) {
        let entry = ActivityEntry::new(action, details, status);

        let mut inner = self.lock();
        if let Some(file) = inner.file.as_mut() {
            if let Err(e) = write_line(file, &entry) {
                warn!("Failed to persist activity entry to {:?}: {}", self.path, e);
            }
        }
        inner.entries.push(entry);
    }

    pub fn info(&self, action: &str, details: impl Into<String>) {
        self.append(action, details, ActivityStatus::Info);
    }

    pub fn success(&self, action: &str, details: impl Into<String>) {
        self.append(action, details, ActivityStatus::Success);
    }

    pub fn warning(&self, action: &str, details: impl Into<String>) {
        self.append(action, details, ActivityStatus::Warning);
    }

    pub fn error(&self, action: &str, details: impl Into<String>) {
        self.append(action, details, ActivityStatus::Error);
    }

    /// Most recent entries first, up to `limit` (all when `None`).
    pub fn recent(&self, limit: Option<usize>) -> Vec<ActivityEntry> {
        // Entries are stored in append order, which is chronological.
        let inner = self.lock();
        let limit = limit.unwrap_or(inner.entries.len());
        inner.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_lines(content: &str, path: &Path) -> Vec<ActivityEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<ActivityEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed activity entry in {:?}: {}", path, e);
                None
            }
        })
        .collect()
}

fn write_line(file: &mut File, entry: &ActivityEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    Ok(())
}
