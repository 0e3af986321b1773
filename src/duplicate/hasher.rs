//! Content hashing
//!
//! Whole-file SHA-512 digests. Two files with the same digest are treated as
//! identical; no size or byte comparison is layered on top.

use crate::core::error::{DedupeError, Result};
use sha2::{Digest, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Buffer size for streaming hash computation (64KB)
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Length of a SHA-512 digest in bytes
pub const DIGEST_LEN: usize = 64;

/// SHA-512 digest of a file's full contents
///
/// Displays as lowercase hexadecimal, which is also its canonical key form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Lowercase hexadecimal form
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full 128 hex chars drown log lines
        write!(f, "ContentDigest({}…)", &self.to_hex()[..16])
    }
}

/// Compute the SHA-512 digest of a file, streaming it through a fixed buffer
///
/// Any open or read failure is reported as [`DedupeError::ReadFailure`]; the
/// caller drops the file from the run.
pub fn hash_file(path: &Path) -> Result<ContentDigest> {
    let read_failure = |source| DedupeError::ReadFailure {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_failure)?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(read_failure)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(finish(hasher))
}

/// Compute the SHA-512 digest of in-memory data
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    let mut hasher = Sha512::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Sha512) -> ContentDigest {
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&hasher.finalize());
    ContentDigest(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_known_sha512_vector() {
        let digest = hash_bytes(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_hash_consistency() {
        let data = b"test data for hashing";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_different_data_different_hash() {
        assert_ne!(hash_bytes(b"first"), hash_bytes(b"second"));
    }

    #[test]
    fn test_file_hash_matches_in_memory_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.jpg");
        // Spans several buffer refills
        let data: Vec<u8> = (0..HASH_BUFFER_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&data));
        assert_eq!(hash_file(&path).unwrap(), hash_file(&path).unwrap());
    }

    #[test]
    fn test_missing_file_is_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = hash_file(&temp_dir.path().join("gone.jpg")).unwrap_err();
        assert!(matches!(err, DedupeError::ReadFailure { .. }));
    }

    #[test]
    fn test_hex_display_and_short_debug() {
        let digest = hash_bytes(b"test");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), DIGEST_LEN * 2);
        assert_eq!(hex, digest.to_string());
        assert_eq!(format!("{:?}", digest), format!("ContentDigest({}…)", &hex[..16]));
    }
}
