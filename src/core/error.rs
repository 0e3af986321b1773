//! Error types for the media deduplicator
//!
//! Only the precondition and pool-start variants are fatal to a run. Every
//! per-file variant is recovered inside its job and surfaces as a counter
//! and a log line.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the media deduplicator
#[derive(Error, Debug)]
pub enum DedupeError {
    /// None of the configured source folders exists
    #[error("Sources shouldn't be empty: no valid source directory was given")]
    NoSources,

    /// Destination is missing or not a directory
    #[error("Destination '{0}' does not exist or is not a directory")]
    InvalidDestination(PathBuf),

    /// Worker threads could not be spawned
    #[error("Failed to start worker pool: {0}")]
    PoolStart(#[source] std::io::Error),

    /// A job was submitted after the pool queue was closed
    #[error("Worker pool is closed; no new work accepted")]
    PoolClosed,

    /// A source directory could not be listed
    #[error("Cannot list source directory '{path}': {message}")]
    Enumeration { path: PathBuf, message: String },

    /// A file could not be read for hashing
    #[error("Failed to read '{path}': {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No timestamp source worked for this file
    #[error("Time can't be calculated for '{path}': {message}")]
    TimestampUnavailable { path: PathBuf, message: String },

    /// Source or existing destination is a directory, symlink, device...
    #[error("Non-regular {role} file '{path}' ({kind})")]
    NonRegularFile {
        role: FileRole,
        path: PathBuf,
        kind: String,
    },

    /// Byte copy to the destination failed
    #[error("Copying '{path}' failed: {source}")]
    CopyFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source could not be deleted after a successful move
    #[error("Removing source file '{path}' failed: {source}")]
    RemovalFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Insert attempted after the hashing barrier
    #[error("Deduplication index is frozen; no insertions after the hashing phase")]
    IndexFrozen,

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Which side of a transfer a [`DedupeError::NonRegularFile`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Source,
    Destination,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Source => write!(f, "source"),
            FileRole::Destination => write!(f, "destination"),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DedupeError>;
