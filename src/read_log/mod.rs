//! Read-log persistence.
//!
//! The read-log is a JSON file recording every paper id a digest has already
//! surfaced, so later runs can skip them:
//!
//! ```json
//! {
//!   "paper_ids": ["2301.00001v1", "2301.00002v1"],
//!   "history": [
//!     { "date": "2024-01-08T07:00:00Z", "paper_ids": ["2301.00001v1", "2301.00002v1"], "count": 2 }
//!   ]
//! }
//! ```
//!
//! Reads fail open: a missing or unreadable log is treated as empty and the
//! condition is reported as a [`ReadLogDiagnostic`]. Writes load, merge and
//! replace the file in one step; ids are only ever added.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Paper;

/// Errors that can occur while writing the read-log.
#[derive(Debug, Error)]
pub enum ReadLogError {
    /// Filesystem failure
    #[error("Read-log IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merged log could not be serialized
    #[error("Read-log serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for read-log operations.
pub type ReadLogResult<T> = Result<T, ReadLogError>;

/// Why a read-log load fell back to an empty log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLogDiagnostic {
    /// No log exists yet (first run)
    Missing { path: PathBuf },

    /// The file exists but could not be read
    Unreadable { path: PathBuf, reason: String },

    /// The file was read but is not a valid read-log
    Corrupt { path: PathBuf, reason: String },
}

impl ReadLogDiagnostic {
    /// Whether the condition deserves a warning rather than an info line.
    pub fn is_warning(&self) -> bool {
        !matches!(self, ReadLogDiagnostic::Missing { .. })
    }
}

impl std::fmt::Display for ReadLogDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadLogDiagnostic::Missing { path } => {
                write!(f, "no read-log at {}", path.display())
            }
            ReadLogDiagnostic::Unreadable { path, reason } => {
                write!(f, "read-log {} is unreadable: {}", path.display(), reason)
            }
            ReadLogDiagnostic::Corrupt { path, reason } => {
                write!(f, "read-log {} is corrupt: {}", path.display(), reason)
            }
        }
    }
}

/// One batch of newly surfaced ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub paper_ids: Vec<String>,
    pub count: usize,
}

/// In-memory read-log: the surfaced id set plus its append-only history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReadLog {
    #[serde(default)]
    paper_ids: Vec<String>,

    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl ReadLog {
    /// Create an empty read-log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously surfaced ids, in the order they were first recorded.
    pub fn paper_ids(&self) -> &[String] {
        &self.paper_ids
    }

    /// Recorded batches, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The surfaced ids as a set.
    pub fn id_set(&self) -> HashSet<&str> {
        self.paper_ids.iter().map(String::as_str).collect()
    }

    /// Whether `id` has been surfaced before.
    pub fn contains(&self, id: &str) -> bool {
        self.paper_ids.iter().any(|known| known == id)
    }

    /// Merge `ids` into the log.
    ///
    /// Ids already present, and repeats within `ids`, are skipped. When at
    /// least one id is new a history entry dated `now` is appended and
    /// returned; otherwise the log is unchanged and `None` is returned.
    pub fn merge<I, S>(&mut self, ids: I, now: DateTime<Utc>) -> Option<HistoryEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = self.paper_ids.iter().cloned().collect();
        let new_ids: Vec<String> = ids
            .into_iter()
            .filter_map(|id| {
                let id = id.as_ref();
                seen.insert(id.to_string()).then(|| id.to_string())
            })
            .collect();

        if new_ids.is_empty() {
            return None;
        }

        self.paper_ids.extend(new_ids.iter().cloned());
        let entry = HistoryEntry {
            date: now,
            count: new_ids.len(),
            paper_ids: new_ids,
        };
        self.history.push(entry.clone());
        Some(entry)
    }
}

/// Outcome of loading the read-log.
#[derive(Debug, Clone)]
pub struct LoadedReadLog {
    pub log: ReadLog,

    /// Set when the log could not be used and an empty one was substituted
    pub diagnostic: Option<ReadLogDiagnostic>,
}

/// Outcome of filtering papers against the read-log.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Papers not surfaced before, in input order
    pub papers: Vec<Paper>,

    /// Number of papers dropped as already read
    pub removed: usize,

    /// Set when the log was missing or unusable
    pub diagnostic: Option<ReadLogDiagnostic>,
}

/// File-backed read-log.
#[derive(Debug, Clone)]
pub struct ReadLogStore {
    path: PathBuf,
}

impl ReadLogStore {
    /// Use the read-log at `path`. Nothing is touched until it is read or written.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the log, falling back to an empty one.
    pub fn load(&self) -> LoadedReadLog {
        let empty = |diagnostic| LoadedReadLog {
            log: ReadLog::new(),
            diagnostic: Some(diagnostic),
        };

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return empty(ReadLogDiagnostic::Missing {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return empty(ReadLogDiagnostic::Unreadable {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        match serde_json::from_str::<ReadLog>(&content) {
            Ok(log) => LoadedReadLog {
                log,
                diagnostic: None,
            },
            Err(e) => empty(ReadLogDiagnostic::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Drop papers whose id is already in the log. Never fails.
    pub fn filter_unread(&self, papers: Vec<Paper>) -> FilterOutcome {
        let LoadedReadLog { log, diagnostic } = self.load();

        match &diagnostic {
            Some(d) if d.is_warning() => warn!("Treating read-log as empty: {}", d),
            Some(d) => info!("No read papers file found ({}), keeping all papers", d),
            None => {}
        }

        let read_ids = log.id_set();
        let total = papers.len();
        let papers: Vec<Paper> = papers
            .into_iter()
            .filter(|paper| !read_ids.contains(paper.id.as_str()))
            .collect();
        let removed = total - papers.len();

        info!("Filtered out {} previously read papers", removed);
        FilterOutcome {
            papers,
            removed,
            diagnostic,
        }
    }

    /// Record surfaced ids: load, merge, and write back in one step.
    ///
    /// Returns the history entry that was appended, or `None` when every id
    /// was already known (the file is then left untouched). A corrupt log is
    /// moved aside to `<name>.corrupt` before a fresh one is written, so no
    /// recorded id is silently discarded.
    pub fn record<I, S>(&self, ids: I, now: DateTime<Utc>) -> ReadLogResult<Option<HistoryEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let LoadedReadLog { mut log, diagnostic } = self.load();

        let entry = match log.merge(ids, now) {
            Some(entry) => entry,
            None => {
                info!("No new papers to add to history");
                return Ok(None);
            }
        };

        match diagnostic {
            Some(ReadLogDiagnostic::Corrupt { reason, .. }) => {
                let backup = self.corrupt_backup_path();
                warn!(
                    "Read-log {} is corrupt ({}); moving it to {}",
                    self.path.display(),
                    reason,
                    backup.display()
                );
                fs::rename(&self.path, &backup).map_err(|source| ReadLogError::Io {
                    path: backup.clone(),
                    source,
                })?;
            }
            Some(ReadLogDiagnostic::Unreadable { reason, .. }) => {
                return Err(ReadLogError::Io {
                    path: self.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, reason),
                });
            }
            Some(ReadLogDiagnostic::Missing { .. }) | None => {}
        }

        self.write(&log)?;
        info!("Added {} papers to read history", entry.count);
        Ok(Some(entry))
    }

    /// Replace the log file atomically with `log`.
    fn write(&self, log: &ReadLog) -> ReadLogResult<()> {
        let io_err = |source| ReadLogError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_string_pretty(log)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}
