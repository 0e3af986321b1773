//! Source folder enumeration
//!
//! Lists the direct children of each source folder and keeps the files whose
//! extension is on the allow-list. Subdirectories are skipped, never entered.

use crate::core::error::{DedupeError, Result};
use log::{trace, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Photo and video container extensions eligible by default (lowercase, no dot)
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    // Photos
    "jpg", "gif", "png", "jpeg", "heic", "bmp", "tif", "jpe", "raw", // Videos
    "mp4", "mov", "m4v", "3gp", "avi", "mkv", "webm", "flv", "wmv", "mpg", "m2v", "mp2",
];

/// A file discovered in a source folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Lowercased extension without the dot
    pub extension: String,
}

/// Case-insensitive extension allow-list
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Build a filter from extensions with or without a leading dot
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Lowercased extension of `path` if it is allowed
    pub fn matches(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_EXTENSIONS)
    }
}

/// List the eligible files directly inside `folder`, sorted by name
///
/// Fails with [`DedupeError::Enumeration`] only when the folder itself can't
/// be listed; unreadable individual entries are logged and skipped.
pub fn scan_folder(folder: &Path, filter: &ExtensionFilter) -> Result<Vec<MediaFile>> {
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(DedupeError::Enumeration {
                    path: folder.to_path_buf(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match filter.matches(entry.path()) {
            Some(extension) => files.push(MediaFile {
                path: entry.path().to_path_buf(),
                extension,
            }),
            None => trace!("Ignoring non-media file {}", entry.path().display()),
        }
    }

    Ok(files)
}

/// Enumerate every source folder, logging and skipping those that fail
pub fn scan_sources(folders: &[PathBuf], filter: &ExtensionFilter) -> Vec<MediaFile> {
    let mut files = Vec::new();
    for folder in folders {
        match scan_folder(folder, filter) {
            Ok(found) => files.extend(found),
            Err(e) => warn!("{}", e),
        }
    }
    files
}
