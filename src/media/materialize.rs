//! Placing surviving files at their destination
//!
//! An existing destination is unlinked first, so the placed file always gets
//! a fresh directory entry. The destination may be a hard link to another
//! source; writing through it would change that source.
//!
//! A hard link is tried next. When linking fails for any reason (other
//! volume, unsupported filesystem) the bytes are copied into a newly created
//! file and synced to disk.

use crate::core::error::{DedupeError, FileRole, Result};
use log::{debug, trace};
use std::fs::{self, File, FileType, Metadata, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// How a destination file came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// Hard link to the source
    Linked,
    /// Full byte copy of the source
    Copied,
    /// Source and destination are already the same filesystem entry
    SameFile,
}

fn describe(file_type: &FileType) -> &'static str {
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_symlink() {
        "symlink"
    } else {
        "special file"
    }
}

#[cfg(unix)]
fn same_entry(_source: &Path, src: &Metadata, _destination: &Path, dst: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    src.dev() == dst.dev() && src.ino() == dst.ino()
}

#[cfg(not(unix))]
fn same_entry(source: &Path, _src: &Metadata, destination: &Path, _dst: &Metadata) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(destination)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Make `destination` hold the contents of `source`
///
/// Succeeds without touching anything when both paths name the same entry.
/// Fails with [`DedupeError::NonRegularFile`] if the source, or an existing
/// destination, is not a regular file.
pub fn materialize(source: &Path, destination: &Path) -> Result<MaterializeOutcome> {
    let copy_failure = |path: &Path, source: io::Error| DedupeError::CopyFailure {
        path: path.to_path_buf(),
        source,
    };

    let src_meta = fs::metadata(source).map_err(|e| copy_failure(source, e))?;
    if !src_meta.is_file() {
        return Err(DedupeError::NonRegularFile {
            role: FileRole::Source,
            path: source.to_path_buf(),
            kind: describe(&src_meta.file_type()).to_string(),
        });
    }

    match fs::metadata(destination) {
        Ok(dst_meta) => {
            if !dst_meta.is_file() {
                return Err(DedupeError::NonRegularFile {
                    role: FileRole::Destination,
                    path: destination.to_path_buf(),
                    kind: describe(&dst_meta.file_type()).to_string(),
                });
            }
            if same_entry(source, &src_meta, destination, &dst_meta) {
                return Ok(MaterializeOutcome::SameFile);
            }
            debug!("Replacing existing '{}'", destination.display());
            fs::remove_file(destination).map_err(|e| copy_failure(destination, e))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(copy_failure(destination, e)),
    }

    match fs::hard_link(source, destination) {
        Ok(()) => {
            trace!(
                "Linked '{}' -> '{}'",
                source.display(),
                destination.display()
            );
            return Ok(MaterializeOutcome::Linked);
        }
        Err(e) => debug!(
            "Hard link '{}' -> '{}' failed ({}), copying instead",
            source.display(),
            destination.display(),
            e
        ),
    }

    copy_contents(source, destination).map_err(|e| copy_failure(source, e))?;
    Ok(MaterializeOutcome::Copied)
}

/// Stream `source` into a new `destination` file and sync it
///
/// Fails if `destination` exists; an existing file is never truncated.
fn copy_contents(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let mut writer = BufWriter::new(out);

    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    let out = writer.into_inner().map_err(|e| e.into_error())?;
    out.sync_all()?;

    Ok(copied)
}

/// Delete a source file after it was materialized in move mode
pub fn remove_source(source: &Path) -> Result<()> {
    fs::remove_file(source).map_err(|e| DedupeError::RemovalFailure {
        path: source.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_materialize_new_destination() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("out.jpg");
        fs::write(&src, b"photo bytes").unwrap();

        let outcome = materialize(&src, &dst).unwrap();

        // Same directory, so a link should normally succeed
        assert!(matches!(
            outcome,
            MaterializeOutcome::Linked | MaterializeOutcome::Copied
        ));
        assert_eq!(fs::read(&dst).unwrap(), b"photo bytes");
        assert!(src.exists());
    }

    #[test]
    fn test_existing_destination_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("b.jpg");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old and longer").unwrap();

        let outcome = materialize(&src, &dst).unwrap();

        assert!(matches!(
            outcome,
            MaterializeOutcome::Linked | MaterializeOutcome::Copied
        ));
        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn test_replacing_linked_destination_keeps_other_source() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.jpg");
        let second = temp_dir.path().join("second.jpg");
        let dst = temp_dir.path().join("x.jpg");
        fs::write(&first, b"first source, longer").unwrap();
        fs::write(&second, b"second").unwrap();
        fs::hard_link(&first, &dst).unwrap();

        materialize(&second, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"second");
        assert_eq!(fs::read(&first).unwrap(), b"first source, longer");
    }

    #[test]
    fn test_copy_contents_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("b.jpg");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"keep").unwrap();

        let err = copy_contents(&src, &dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dst).unwrap(), b"keep");
    }

    #[test]
    fn test_copy_contents_directly() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.mp4");
        let dst = temp_dir.path().join("b.mp4");
        let data: Vec<u8> = (0..200_000).map(|i| (i % 7) as u8).collect();
        fs::write(&src, &data).unwrap();

        assert_eq!(copy_contents(&src, &dst).unwrap(), data.len() as u64);
        assert_eq!(fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn test_same_path_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        fs::write(&src, b"keep me").unwrap();

        assert_eq!(materialize(&src, &src).unwrap(), MaterializeOutcome::SameFile);
        assert_eq!(fs::read(&src).unwrap(), b"keep me");
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_hard_link_is_same_file() {
        use std::os::unix::fs::MetadataExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("alias.jpg");
        fs::write(&src, b"shared inode").unwrap();
        fs::hard_link(&src, &dst).unwrap();
        let links_before = fs::metadata(&src).unwrap().nlink();

        assert_eq!(materialize(&src, &dst).unwrap(), MaterializeOutcome::SameFile);
        assert_eq!(fs::metadata(&src).unwrap().nlink(), links_before);
        assert_eq!(fs::read(&dst).unwrap(), b"shared inode");
    }

    #[test]
    fn test_directory_source_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("folder.jpg");
        fs::create_dir(&src).unwrap();

        let err = materialize(&src, &temp_dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(
            err,
            DedupeError::NonRegularFile {
                role: FileRole::Source,
                ..
            }
        ));
    }

    #[test]
    fn test_directory_destination_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        let dst = temp_dir.path().join("taken.jpg");
        fs::write(&src, b"x").unwrap();
        fs::create_dir(&dst).unwrap();

        let err = materialize(&src, &dst).unwrap_err();
        assert!(matches!(
            err,
            DedupeError::NonRegularFile {
                role: FileRole::Destination,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_source_is_copy_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = materialize(
            &temp_dir.path().join("gone.jpg"),
            &temp_dir.path().join("out.jpg"),
        )
        .unwrap_err();
        assert!(matches!(err, DedupeError::CopyFailure { .. }));
    }

    #[test]
    fn test_remove_source() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.jpg");
        fs::write(&src, b"x").unwrap();

        remove_source(&src).unwrap();
        assert!(!src.exists());

        let err = remove_source(&src).unwrap_err();
        assert!(matches!(err, DedupeError::RemovalFailure { .. }));
    }
}
