//! Duplicate detection module
//!
//! Exact-match duplicate detection over whole-file SHA-512 digests.
//!
//! # Submodules
//!
//! - `hasher` - Content digests of files and byte buffers
//! - `index` - Concurrent first-seen-wins digest index

pub mod hasher;
pub mod index;

pub use hasher::{hash_bytes, hash_file, ContentDigest};
pub use index::{DeduplicationIndex, IndexEntry, InsertOutcome};
