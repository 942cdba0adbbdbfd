//! Per-directory record of which track files were processed and how it went.
//!
//! The document is a JSON object keyed by file name:
//!
//! ```json
//! { "hike.gpx": { "Error": "", "Added": "2021-07-04T18:00:00Z" } }
//! ```
//!
//! An empty `Error` means the file succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const HISTORY_FILENAME: &str = "history.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "Error", default)]
    pub error: String,
    #[serde(rename = "Added")]
    pub added: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read history {}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("history {} is not valid: {}", .path.display(), .source)]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write history {}: {}", .path.display(), .source)]
    Write { path: PathBuf, source: io::Error },
}

/// Accepted on-disk layouts. Older uploaders wrapped the map in a
/// `FilenameHistory` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryDocument {
    Wrapped {
        #[serde(rename = "FilenameHistory")]
        filename_history: BTreeMap<String, HistoryEntry>,
    },
    Entries(BTreeMap<String, HistoryEntry>),
}

impl HistoryDocument {
    fn into_entries(self) -> BTreeMap<String, HistoryEntry> {
        match self {
            HistoryDocument::Wrapped { filename_history } => filename_history,
            HistoryDocument::Entries(entries) => entries,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: BTreeMap<String, HistoryEntry>,
}

impl HistoryStore {
    /// Empty store that will be saved into `directory`.
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(HISTORY_FILENAME),
            entries: BTreeMap::new(),
        }
    }

    /// Load the history of `directory`. A missing document is an empty store.
    pub fn load(directory: &Path) -> Result<Self, HistoryError> {
        let mut store = Self::new(directory);
        let bytes = match fs::read(&store.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(store),
            Err(source) => {
                return Err(HistoryError::Read {
                    path: store.path,
                    source,
                })
            }
        };
        let document: HistoryDocument =
            serde_json::from_slice(&bytes).map_err(|source| HistoryError::Malformed {
                path: store.path.clone(),
                source,
            })?;
        store.entries = document.into_entries();
        Ok(store)
    }

    /// Replace the document on disk with the current entries.
    pub fn save(&self) -> Result<(), HistoryError> {
        let write_err = |source: io::Error| HistoryError::Write {
            path: self.path.clone(),
            source,
        };
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;

        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut tmp, formatter);
        self.entries
            .serialize(&mut serializer)
            .map_err(HistoryError::Serialize)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.persist(&self.path).map_err(|err| write_err(err.error))?;
        Ok(())
    }

    /// Successes are always skipped; failures only when not retrying.
    pub fn should_skip(&self, file_name: &str, retry_failures: bool) -> bool {
        self.entries
            .get(file_name)
            .is_some_and(|entry| entry.succeeded() || !retry_failures)
    }

    pub fn record(&mut self, file_name: &str, error: impl Into<String>) {
        self.record_at(file_name, error, Utc::now());
    }

    pub fn record_at(&mut self, file_name: &str, error: impl Into<String>, added: DateTime<Utc>) {
        self.entries.insert(
            file_name.to_string(),
            HistoryEntry {
                error: error.into(),
                added,
            },
        );
    }

    pub fn get(&self, file_name: &str) -> Option<&HistoryEntry> {
        self.entries.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
