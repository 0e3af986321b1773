//! Timestamp resolution for renaming
//!
//! Sources are tried in order and the first hit wins:
//!
//! 1. a `YYYYMMDDTHHMMSS` prefix already on the file name
//! 2. EXIF capture time embedded in the file
//! 3. filesystem creation (birth) time, where the platform reports one
//! 4. filesystem modification time
//!
//! A prefix hit means the file was renamed by an earlier run, so callers must
//! not stamp it again. If the file can't be opened or stat'ed at all the
//! resolver fails with [`DedupeError::TimestampUnavailable`] and the caller
//! substitutes the current time.

use crate::core::error::{DedupeError, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use exif::{In, Tag, Value};
use log::warn;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::SystemTime;

/// chrono pattern of the rename prefix
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Length of a formatted prefix, e.g. `20240131T235959`
pub const TIMESTAMP_LEN: usize = 15;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Where a resolved timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    FileName,
    Metadata,
    Created,
    Modified,
    /// Substituted wall-clock time after every source failed
    CurrentTime,
}

/// A timestamp picked for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub time: NaiveDateTime,
    pub source: TimestampSource,
}

impl ResolvedTimestamp {
    /// The file name already carries this timestamp as its prefix
    pub fn already_named(&self) -> bool {
        self.source == TimestampSource::FileName
    }
}

/// Reads a capture time embedded in a media file
pub trait CaptureTimeReader: Send + Sync {
    fn capture_time(&self, path: &Path) -> Option<NaiveDateTime>;
}

/// EXIF `DateTimeOriginal`, then `DateTime`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl CaptureTimeReader for ExifReader {
    fn capture_time(&self, path: &Path) -> Option<NaiveDateTime> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

        [Tag::DateTimeOriginal, Tag::DateTime]
            .iter()
            .find_map(|tag| match &exif.get_field(*tag, In::PRIMARY)?.value {
                Value::Ascii(values) => values.first().and_then(|raw| parse_exif_datetime(raw)),
                _ => None,
            })
    }
}

fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let text = std::str::from_utf8(raw).ok()?;
    let text = text.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(text, EXIF_DATETIME_FORMAT).ok()
}

/// Parse a `YYYYMMDDTHHMMSS` prefix from a file name
pub fn parse_name_prefix(file_name: &str) -> Option<NaiveDateTime> {
    let prefix = file_name.get(..TIMESTAMP_LEN)?;
    let well_formed = prefix
        .bytes()
        .enumerate()
        .all(|(i, b)| if i == 8 { b == b'T' } else { b.is_ascii_digit() });
    if !well_formed {
        return None;
    }
    NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT).ok()
}

/// Format a timestamp as a file name prefix, without colons
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string().replace(':', "")
}

/// `<timestamp> <original name>`
pub fn prefixed_name(time: &NaiveDateTime, file_name: &str) -> String {
    format!("{} {}", format_timestamp(time), file_name)
}

fn to_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Runs the fallback chain for a file
pub struct TimestampResolver {
    metadata: Box<dyn CaptureTimeReader>,
}

impl TimestampResolver {
    /// Resolver that decodes EXIF metadata
    pub fn new() -> Self {
        Self::with_reader(ExifReader)
    }

    /// Resolver with a custom embedded-metadata reader
    pub fn with_reader<R: CaptureTimeReader + 'static>(reader: R) -> Self {
        Self {
            metadata: Box::new(reader),
        }
    }

    /// Pick the best available timestamp for `path`
    pub fn resolve(&self, path: &Path) -> Result<ResolvedTimestamp> {
        if let Some(time) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_name_prefix)
        {
            return Ok(ResolvedTimestamp {
                time,
                source: TimestampSource::FileName,
            });
        }

        let unavailable = |e: std::io::Error| DedupeError::TimestampUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let file = File::open(path).map_err(unavailable)?;

        if let Some(time) = self.metadata.capture_time(path) {
            return Ok(ResolvedTimestamp {
                time,
                source: TimestampSource::Metadata,
            });
        }

        let metadata = file.metadata().map_err(unavailable)?;
        if let Ok(created) = metadata.created() {
            return Ok(ResolvedTimestamp {
                time: to_local(created),
                source: TimestampSource::Created,
            });
        }

        let modified = metadata.modified().map_err(unavailable)?;
        Ok(ResolvedTimestamp {
            time: to_local(modified),
            source: TimestampSource::Modified,
        })
    }

    /// Resolve, falling back to the current wall-clock time on failure
    pub fn resolve_or_now(&self, path: &Path) -> ResolvedTimestamp {
        match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("{}; using current time", e);
                ResolvedTimestamp {
                    time: Local::now().naive_local(),
                    source: TimestampSource::CurrentTime,
                }
            }
        }
    }
}

impl Default for TimestampResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    struct FixedReader(Option<NaiveDateTime>);

    impl CaptureTimeReader for FixedReader {
        fn capture_time(&self, _path: &Path) -> Option<NaiveDateTime> {
            self.0
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_parse_name_prefix() {
        assert_eq!(
            parse_name_prefix("20190704T183012 IMG_0001.jpg"),
            Some(at(2019, 7, 4, 18, 30, 12))
        );
        assert_eq!(parse_name_prefix("20190704T183012"), Some(at(2019, 7, 4, 18, 30, 12)));
        assert_eq!(parse_name_prefix("IMG_0001.jpg"), None);
        assert_eq!(parse_name_prefix("2019070T183012.jpg"), None);
        assert_eq!(parse_name_prefix("20191304T183012.jpg"), None);
        assert_eq!(parse_name_prefix("short.jpg"), None);
        assert_eq!(parse_name_prefix("ééééééééééé.jpg"), None);
    }

    #[test]
    fn test_format_and_prefix() {
        let t = at(2021, 1, 2, 3, 4, 5);
        assert_eq!(format_timestamp(&t), "20210102T030405");
        assert_eq!(prefixed_name(&t, "a.jpg"), "20210102T030405 a.jpg");
        assert_eq!(parse_name_prefix(&prefixed_name(&t, "a.jpg")), Some(t));
    }

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(
            parse_exif_datetime(b"2016:09:25 14:13:48"),
            Some(at(2016, 9, 25, 14, 13, 48))
        );
        assert_eq!(
            parse_exif_datetime(b"2016:09:25 14:13:48\0"),
            Some(at(2016, 9, 25, 14, 13, 48))
        );
        assert_eq!(parse_exif_datetime(b"    :  :     :  :  "), None);
    }

    #[test]
    fn test_name_prefix_wins_over_everything() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("20000101T000000 holiday.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        let resolver = TimestampResolver::with_reader(FixedReader(Some(at(2010, 5, 5, 5, 5, 5))));
        let resolved = resolver.resolve(&path).unwrap();

        assert_eq!(resolved.time, at(2000, 1, 1, 0, 0, 0));
        assert!(resolved.already_named());
    }

    #[test]
    fn test_name_prefix_needs_no_file() {
        let resolver = TimestampResolver::new();
        let resolved = resolver
            .resolve(Path::new("/nowhere/20220202T020202.jpg"))
            .unwrap();
        assert_eq!(resolved.source, TimestampSource::FileName);
    }

    #[test]
    fn test_metadata_before_filesystem_times() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("IMG_1234.jpg");
        fs::write(&path, b"data").unwrap();

        let resolver = TimestampResolver::with_reader(FixedReader(Some(at(2015, 6, 7, 8, 9, 10))));
        let resolved = resolver.resolve(&path).unwrap();

        assert_eq!(resolved.source, TimestampSource::Metadata);
        assert_eq!(resolved.time, at(2015, 6, 7, 8, 9, 10));
        assert!(!resolved.already_named());
    }

    #[test]
    fn test_filesystem_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.png");
        fs::write(&path, b"no exif here").unwrap();

        let resolved = TimestampResolver::new().resolve(&path).unwrap();
        let metadata = fs::metadata(&path).unwrap();
        let expected = match metadata.created() {
            Ok(created) => (TimestampSource::Created, to_local(created)),
            Err(_) => (TimestampSource::Modified, to_local(metadata.modified().unwrap())),
        };

        assert_eq!((resolved.source, resolved.time), expected);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let err = TimestampResolver::new()
            .resolve(&temp_dir.path().join("gone.jpg"))
            .unwrap_err();
        assert!(matches!(err, DedupeError::TimestampUnavailable { .. }));
    }

    #[test]
    fn test_resolve_or_now_substitutes_current_time() {
        let temp_dir = TempDir::new().unwrap();
        let before = Local::now().naive_local();
        let resolved = TimestampResolver::new().resolve_or_now(&temp_dir.path().join("gone.jpg"));
        let after = Local::now().naive_local();

        assert!(resolved.time >= before && resolved.time <= after);
        assert_eq!(resolved.source, TimestampSource::CurrentTime);
    }
}
