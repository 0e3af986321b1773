//! Media file handling
//!
//! # Submodules
//!
//! - `scanner` - Source folder enumeration and the extension allow-list
//! - `timestamp` - Capture-time resolution used when renaming
//! - `materialize` - Hard-link-or-copy placement of surviving files

pub mod materialize;
pub mod scanner;
pub mod timestamp;

pub use materialize::{materialize, remove_source, MaterializeOutcome};
pub use scanner::{scan_folder, scan_sources, ExtensionFilter, MediaFile, DEFAULT_MEDIA_EXTENSIONS};
pub use timestamp::{ResolvedTimestamp, TimestampResolver, TimestampSource};
