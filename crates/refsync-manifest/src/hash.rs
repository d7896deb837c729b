//! SHA-256 content hashing, streamed so that per-file digestion is not
//! bounded by the manifest file's 2 GiB cap (see `codec::MAX_MANIFEST_BYTES`
//! and the open question in the design notes this crate is grounded on).

use refsync_core::{Digest, SyncError, SyncResult};
use sha2::{Digest as _, Sha256};
use std::io::Read;
use std::path::Path;

const READ_BUFFER_LEN: usize = 64 * 1024;

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest::from_bytes(hasher.finalize().into())
}

/// Hash a file from disk using a streaming 64 KiB buffer, so files of any
/// size can be digested without loading them whole into memory.
pub fn hash_file(path: &Path) -> SyncResult<Digest> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER_LEN];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Digest::from_bytes(hasher.finalize().into()))
}

/// Returns `Ok(None)` for a path that doesn't exist or isn't a regular
/// file; callers treat that as "no entry" rather than an I/O error.
pub fn hash_regular_file(path: &Path) -> SyncResult<Option<Digest>> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SyncError::Filesystem(e)),
    };
    if !metadata.is_file() {
        return Ok(None);
    }
    hash_file(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_hash_is_deterministic() {
        assert_eq!(hash_bytes(b""), hash_bytes(b""));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(hash_bytes(b"foo"), hash_bytes(b"bar"));
    }

    #[test]
    fn hash_file_matches_in_memory_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"hello refsync").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"hello refsync"));
    }

    #[test]
    fn hash_regular_file_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.bin");
        assert!(hash_regular_file(&path).unwrap().is_none());
    }

    #[test]
    fn hash_regular_file_directory_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hash_regular_file(dir.path()).unwrap().is_none());
    }

    proptest! {
        #[test]
        fn hash_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            prop_assert_eq!(hash_bytes(&data), hash_bytes(&data));
        }
    }
}
