//! Deduplication index
//!
//! Maps each [`ContentDigest`] to the first path observed with it. Hashing
//! jobs race on [`DeduplicationIndex::try_insert`]; the check-and-insert runs
//! under one mutex so exactly one caller per digest sees `Inserted`.
//!
//! Once the hashing phase has drained, the coordinator calls
//! [`DeduplicationIndex::freeze`]. From then on the index is read-only and
//! any late insert fails with [`DedupeError::IndexFrozen`].

use crate::core::error::{DedupeError, Result};
use crate::duplicate::hasher::ContentDigest;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Outcome of an insertion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This path is now the survivor for its digest
    Inserted,
    /// Another path already holds the digest
    AlreadyPresent(PathBuf),
}

/// A surviving file and its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub digest: ContentDigest,
    pub path: PathBuf,
}

/// Thread-safe first-seen-wins digest index
#[derive(Debug, Default)]
pub struct DeduplicationIndex {
    entries: Mutex<HashMap<ContentDigest, PathBuf>>,
    frozen: AtomicBool,
}

impl DeduplicationIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record `path` for `digest` unless a path is already held
    pub fn try_insert(&self, digest: ContentDigest, path: PathBuf) -> Result<InsertOutcome> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DedupeError::IoError("deduplication index lock poisoned".to_string()))?;

        // Checked under the lock so a freeze can't interleave with an insert
        if self.frozen.load(Ordering::Acquire) {
            return Err(DedupeError::IndexFrozen);
        }

        match entries.get(&digest) {
            Some(existing) => Ok(InsertOutcome::AlreadyPresent(existing.clone())),
            None => {
                entries.insert(digest, path);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    /// Mark the hashing barrier as passed
    pub fn freeze(&self) {
        // Taking the lock waits out any insert still in flight
        let _guard = self.entries.lock();
        self.frozen.store(true, Ordering::Release);
    }

    /// Whether [`freeze`](Self::freeze) has been called
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Every surviving entry, in unspecified order
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        match self.entries.lock() {
            Ok(entries) => entries
                .iter()
                .map(|(digest, path)| IndexEntry {
                    digest: *digest,
                    path: path.clone(),
                })
                .collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(digest, path)| IndexEntry {
                    digest: *digest,
                    path: path.clone(),
                })
                .collect(),
        }
    }

    /// Number of unique digests
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
