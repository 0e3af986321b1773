//! Media Deduplicator Library
//!
//! Collects the photos and videos of several folders into one destination
//! folder, keeping exactly one file per distinct content. Files are compared
//! by SHA-512 digest, placed by hard link when possible and by copy
//! otherwise, and can optionally be renamed after their capture time.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error handling, the worker pool and the
//!   two-phase pipeline coordinator
//! - [`duplicate`] - Content hashing and the first-seen-wins digest index
//! - [`media`] - Folder scanning, timestamp resolution and file placement
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use media_deduplicator::core::pipeline::{Pipeline, RunOptions};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let options = RunOptions::new(
//!         vec![PathBuf::from("/media/phone"), PathBuf::from("/media/camera")],
//!         PathBuf::from("/media/library"),
//!     )
//!     .with_rename(true);
//!
//!     let report = Pipeline::new(options).run()?;
//!     println!(
//!         "{} unique files, {} duplicates",
//!         report.unique_files, report.duplicates
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Content Deduplication** - SHA-512 digests, first file seen wins
//! - **Parallel** - Hashing and placement run on a bounded worker pool
//! - **Hard Links** - No extra disk space when source and destination share a volume
//! - **Capture-Time Renaming** - File name prefix, EXIF, then filesystem times
//! - **Simulation** - Report the planned placements without touching any file

pub mod cli;
pub mod core;
pub mod duplicate;
pub mod media;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
