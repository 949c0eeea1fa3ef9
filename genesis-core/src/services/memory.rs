//! services/memory.rs
//!
//! Append-only event log with two retention tiers.
//! - One pretty-printed JSON array per tier (`memory.json`, `long_term_memory.json`).
//! - Appends are read-modify-write under the writer lock, landed with
//!   temp file + rename so readers always see a whole array.
//! - The writer lock is an in-process mutex plus an exclusive advisory lock on
//!   `<artifact>.lock`, so independent handles and other processes serialize too.
//! - Readers never take the lock.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::CoreConfig;
use crate::error::PersistenceError;
use crate::services::reasoning::{AnalysisReport, Reward};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ShortTerm,
    LongTerm,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::ShortTerm => f.write_str("short-term"),
            Tier::LongTerm => f.write_str("long-term"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStats {
    pub mean: f64,
    pub std: f64,
}

/// One completed pipeline pass, as kept in the short-term tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub input_summary: String,
    pub embedding_stats: EmbeddingStats,
    pub decision: String,
    pub reward: Reward,
    pub analysis: AnalysisReport,
    /// Improvement message and action outcome joined by `" | "`.
    pub improvement_outcome: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiModal {
    pub image_embedding_shape: Option<Vec<usize>>,
    pub numerical_data_shape: Option<Vec<usize>>,
}

impl MultiModal {
    pub fn is_empty(&self) -> bool {
        self.image_embedding_shape.is_none() && self.numerical_data_shape.is_none()
    }
}

/// Long-term tier record: the short-term fields plus multi-modal shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermEvent {
    #[serde(flatten)]
    pub event: EventRecord,
    pub multi_modal: MultiModal,
}

/// A record that can live in an [`EventStore`].
pub trait StoredEvent: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn input_summary(&self) -> &str;
}

impl StoredEvent for EventRecord {
    fn input_summary(&self) -> &str {
        &self.input_summary
    }
}

impl StoredEvent for LongTermEvent {
    fn input_summary(&self) -> &str {
        &self.event.input_summary
    }
}

pub type ShortTermStore = EventStore<EventRecord>;
pub type LongTermStore = EventStore<LongTermEvent>;

#[derive(Debug)]
struct StoreInner {
    tier: Tier,
    path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

/// Held for the whole read-modify-rename of an append. Dropping the file
/// releases the advisory lock.
struct WriteGuard<'a> {
    _file: File,
    _local: MutexGuard<'a, ()>,
}

/// Handle to one tier artifact. Clones share the in-process mutex; every
/// handle on the same path, in any process, shares the lock file.
#[derive(Debug)]
pub struct EventStore<R> {
    inner: Arc<StoreInner>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for EventStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _record: PhantomData,
        }
    }
}

impl EventStore<EventRecord> {
    pub fn short_term(cfg: &CoreConfig) -> Self {
        Self::new(Tier::ShortTerm, cfg.memory.short_term_path.clone())
    }
}

impl EventStore<LongTermEvent> {
    pub fn long_term(cfg: &CoreConfig) -> Self {
        Self::new(Tier::LongTerm, cfg.memory.long_term_path.clone())
    }
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl<R: StoredEvent> EventStore<R> {
    pub fn new(tier: Tier, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, |name| format!("{name}.lock"));
        Self {
            inner: Arc::new(StoreInner {
                tier,
                path,
                lock_path,
                writer: Mutex::new(()),
            }),
            _record: PhantomData,
        }
    }

    pub fn tier(&self) -> Tier {
        self.inner.tier
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Create the parent directory and an empty `[]` artifact if absent.
    /// Returns `true` when the artifact was created by this call.
    pub fn initialize(&self) -> Result<bool, PersistenceError> {
        let _guard = self.lock_writer()?;
        self.ensure_artifact()
    }

    /// Durably append one record. The artifact is fully rewritten before this returns.
    pub fn append(&self, record: &R) -> Result<(), PersistenceError> {
        let _guard = self.lock_writer()?;
        self.ensure_artifact()?;
        let mut records = self.read_records()?;
        records.push(record.clone());
        let bytes = serde_json::to_vec_pretty(&records).map_err(|source| PersistenceError::Encode {
            tier: self.inner.tier,
            path: self.inner.path.clone(),
            source,
        })?;
        self.write_atomic(&bytes)?;
        tracing::debug!(
            tier = %self.inner.tier,
            path = %self.inner.path.display(),
            count = records.len(),
            "event appended"
        );
        Ok(())
    }

    /// Every record in append order. A missing or blank artifact is empty, not an error.
    pub fn retrieve_all(&self) -> Result<Vec<R>, PersistenceError> {
        self.read_records()
    }

    /// Case-insensitive substring match on `input_summary`, in append order.
    pub fn query(&self, term: &str) -> Result<Vec<R>, PersistenceError> {
        let needle = term.to_lowercase();
        let hits: Vec<R> = self
            .read_records()?
            .into_iter()
            .filter(|r| r.input_summary().to_lowercase().contains(&needle))
            .collect();
        tracing::debug!(tier = %self.inner.tier, term, hits = hits.len(), "query");
        Ok(hits)
    }

    pub fn len(&self) -> Result<usize, PersistenceError> {
        Ok(self.read_records()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }

    // ---------- internals ----------

    fn lock_writer(&self) -> Result<WriteGuard<'_>, PersistenceError> {
        // The guarded unit carries no state, so a poisoned lock is still usable.
        let local = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.inner.lock_path)
            .map_err(|e| self.io_err(e))?;
        file.lock().map_err(|e| self.io_err(e))?;
        Ok(WriteGuard {
            _file: file,
            _local: local,
        })
    }

    fn ensure_parent(&self) -> Result<(), PersistenceError> {
        match self.inner.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))
            }
            _ => Ok(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            tier: self.inner.tier,
            path: self.inner.path.clone(),
            source,
        }
    }

    fn ensure_artifact(&self) -> Result<bool, PersistenceError> {
        if self.inner.path.exists() {
            return Ok(false);
        }
        self.write_atomic(b"[]")?;
        tracing::info!(
            tier = %self.inner.tier,
            path = %self.inner.path.display(),
            "store initialized"
        );
        Ok(true)
    }

    fn read_records(&self) -> Result<Vec<R>, PersistenceError> {
        let text = match fs::read_to_string(&self.inner.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| PersistenceError::Corrupt {
            tier: self.inner.tier,
            path: self.inner.path.clone(),
            source,
        })
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let path = &self.inner.path;
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = sibling(path, |name| format!(".{name}.{}.{seq}.tmp", std::process::id()));
        let landed = write_file(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
        if let Err(e) = landed {
            // Best effort; the temp file may never have been created.
            let _ = fs::remove_file(&tmp);
            return Err(self.io_err(e));
        }
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    f.write_all(bytes)?;
    f.sync_all()
}

/// A file next to `path`, named from the artifact's file name.
fn sibling(path: &Path, name: impl FnOnce(&str) -> String) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events".to_string());
    path.with_file_name(name(&file_name))
}
