//! Per-file content fingerprints.
//!
//! A fingerprint is `(path, content hash, size, mtime)`. Staleness checking
//! takes the fast path first — mtime and size — and only rehashes the
//! content when they still agree.

use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub file_path: String,
    /// Hex-encoded SHA-256 of the file content.
    pub checksum: String,
    pub size: u64,
    /// Modification time in whole nanoseconds since the epoch.
    pub mtime_ns: u128,
}

impl FileFingerprint {
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let content = fs::read(path)?;
        Ok(Self {
            file_path: path.to_string_lossy().into_owned(),
            checksum: hex::encode(Sha256::digest(&content)),
            size: metadata.len(),
            mtime_ns: mtime_ns(&metadata)?,
        })
    }

    /// True when the file on disk no longer matches this fingerprint. A
    /// missing or unreadable file counts as outdated.
    pub fn is_outdated(&self) -> bool {
        let path = Path::new(&self.file_path);
        let Ok(metadata) = fs::metadata(path) else {
            return true;
        };
        let mtime = match mtime_ns(&metadata) {
            Ok(value) => value,
            Err(_) => return true,
        };
        if metadata.len() == self.size && mtime == self.mtime_ns {
            return false;
        }
        // Metadata disagrees; the content hash settles it (a rewrite with
        // identical bytes is not a change).
        match fs::read(path) {
            Ok(content) => hex::encode(Sha256::digest(&content)) != self.checksum,
            Err(_) => true,
        }
    }
}

fn mtime_ns(metadata: &fs::Metadata) -> io::Result<u128> {
    let modified = metadata.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0))
}

/// Hex digest of arbitrary bytes; shared by cache-id and analysis-id
/// derivation.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_fresh_fingerprint_is_current() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\n").unwrap();
        let fingerprint = FileFingerprint::from_file(&file).unwrap();
        assert!(!fingerprint.is_outdated());
    }

    #[test]
    fn test_modified_content_is_outdated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\n").unwrap();
        let fingerprint = FileFingerprint::from_file(&file).unwrap();
        fs::write(&file, "x = 2\n").unwrap();
        assert!(fingerprint.is_outdated());
    }

    #[test]
    fn test_deleted_file_is_outdated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\n").unwrap();
        let fingerprint = FileFingerprint::from_file(&file).unwrap();
        fs::remove_file(&file).unwrap();
        assert!(fingerprint.is_outdated());
    }

    #[test]
    fn test_identical_rewrite_is_current() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1\n").unwrap();
        let fingerprint = FileFingerprint::from_file(&file).unwrap();
        // Rewriting the same bytes bumps mtime but not the hash.
        fs::write(&file, "x = 1\n").unwrap();
        assert!(!fingerprint.is_outdated());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(content_digest(b"abc"), content_digest(b"abc"));
        assert_ne!(content_digest(b"abc"), content_digest(b"abd"));
    }
}
