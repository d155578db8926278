//! Durable memory for drivers: append-only journals and a flat KV file.
//!
//! Layout under the memory directory:
//!
//! - `<stream>.jsonl`: one JSON value per line, appended in call order.
//! - `kv.json`: a single JSON object of string keys to string values,
//!   rewritten in full on every set.
//! - `project_index.json`: the last project index snapshot.
//!
//! The store assumes a single writer, which the execution thread guarantees.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

const MEMORY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::memory");
const KV_FILE: &str = "kv.json";
const INDEX_FILE: &str = "project_index.json";
const JOURNAL_EXTENSION: &str = "jsonl";

/// Errors raised by [`MemoryStore`].
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Stream names are restricted to `[A-Za-z0-9_-]+`.
    #[error("invalid stream name: '{name}'")]
    InvalidStream { name: String },
    /// Reading or writing a memory file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    /// A memory file exists but does not hold the expected JSON.
    #[error("memory file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
    /// An entry could not be serialised.
    #[error("failed to serialise memory entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MemoryError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// File-backed journal and key/value store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
}

impl MemoryStore {
    /// Store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Memory directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Appends `entry` as one line to the named stream.
    ///
    /// # Errors
    ///
    /// Fails on an invalid stream name or a filesystem error.
    pub fn append(&self, stream: &str, entry: &Value) -> Result<PathBuf, MemoryError> {
        let path = self.journal_path(stream)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.ensure_root()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| MemoryError::io(&path, source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| MemoryError::io(&path, source))?;
        Ok(path)
    }

    /// Returns up to `limit` most recent entries of a stream, oldest first.
    ///
    /// A stream that was never written reads as empty. Lines that are not
    /// valid JSON are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails on an invalid stream name or a filesystem error.
    pub fn tail(&self, stream: &str, limit: usize) -> Result<Vec<Value>, MemoryError> {
        let path = self.journal_path(stream)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(MemoryError::io(&path, source)),
        };
        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| MemoryError::io(&path, source))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(value) => entries.push(value),
                Err(error) => warn!(
                    target: MEMORY_TARGET,
                    stream,
                    line = number + 1,
                    %error,
                    "skipping unreadable journal line"
                ),
            }
        }
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        Ok(entries)
    }

    /// Value stored under `key`, or an empty string when absent.
    ///
    /// # Errors
    ///
    /// Fails when the KV file exists but cannot be read or parsed.
    pub fn kv_get(&self, key: &str) -> Result<String, MemoryError> {
        Ok(self.read_kv()?.remove(key).unwrap_or_default())
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails when the KV file cannot be read or rewritten.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        let mut map = self.read_kv()?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_json(KV_FILE, &map).map(|_| ())
    }

    /// Persists a project index snapshot and returns its path.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot cannot be serialised or written.
    pub fn write_index<T: Serialize>(&self, index: &T) -> Result<PathBuf, MemoryError> {
        self.write_json(INDEX_FILE, index)
    }

    fn journal_path(&self, stream: &str) -> Result<PathBuf, MemoryError> {
        if !is_valid_stream(stream) {
            return Err(MemoryError::InvalidStream {
                name: stream.to_owned(),
            });
        }
        Ok(self.root.join(format!("{stream}.{JOURNAL_EXTENSION}")))
    }

    fn read_kv(&self) -> Result<BTreeMap<String, String>, MemoryError> {
        let path = self.root.join(KV_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(MemoryError::io(&path, source)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| MemoryError::Corrupt {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, MemoryError> {
        self.ensure_root()?;
        let path = self.root.join(file_name);
        let rendered = serde_json::to_vec_pretty(value)?;
        let mut staged =
            NamedTempFile::new_in(&self.root).map_err(|source| MemoryError::io(&path, source))?;
        staged
            .write_all(&rendered)
            .map_err(|source| MemoryError::io(&path, source))?;
        staged
            .persist(&path)
            .map_err(|error| MemoryError::io(&path, error.error))?;
        Ok(path)
    }

    fn ensure_root(&self) -> Result<(), MemoryError> {
        fs::create_dir_all(&self.root).map_err(|source| MemoryError::io(&self.root, source))
    }
}

fn is_valid_stream(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}
