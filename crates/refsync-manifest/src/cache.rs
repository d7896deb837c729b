//! In-memory `path -> digest` map with optional lazy digestion from a bound
//! root directory.

use crate::codec::{self, ManifestEntry};
use crate::hash;
use refsync_core::{Digest, RelPath, SyncResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A `RelPath -> Digest` map, optionally bound to a root directory for
/// lazy digest synthesis. Interior mutability on the map lets `difference`
/// take `&self` on both operands while still admitting entries discovered
/// during the comparison, mirroring the "lazy digestion on query" contract.
pub struct HashCache {
    entries: RefCell<HashMap<RelPath, Digest>>,
    root: Option<PathBuf>,
}

impl HashCache {
    /// Build a cache with no root binding and no entries.
    pub fn empty() -> Self {
        HashCache {
            entries: RefCell::new(HashMap::new()),
            root: None,
        }
    }

    /// Build a cache with no entries but bound to `root`, so every query
    /// is satisfied (or not) by lazy digestion. Used by the orchestrator
    /// when no stored manifest exists yet (a clean install).
    pub fn bound_empty(root: PathBuf) -> Self {
        HashCache {
            entries: RefCell::new(HashMap::new()),
            root: Some(root),
        }
    }

    /// Build a cache by recursively walking `root`, digesting every regular
    /// file, keyed by its path relative to `root` with `/` separators.
    /// Symbolic links and other non-regular files are skipped.
    pub fn from_directory(root: &Path) -> SyncResult<Self> {
        let mut entries = HashMap::new();
        for dirent in walkdir::WalkDir::new(root).into_iter() {
            let dirent = dirent.map_err(|e| {
                refsync_core::SyncError::Filesystem(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                ))
            })?;
            if !dirent.file_type().is_file() {
                continue;
            }
            let rel = dirent
                .path()
                .strip_prefix(root)
                .unwrap_or(dirent.path());
            let digest = hash::hash_file(dirent.path())?;
            entries.insert(RelPath::from_local(rel), digest);
        }
        tracing::debug!(root = %root.display(), count = entries.len(), "walked directory tree");
        Ok(HashCache {
            entries: RefCell::new(entries),
            root: Some(root.to_path_buf()),
        })
    }

    /// Parse a manifest file and load it into a cache. `root` binds the
    /// cache for future lazy digestion; `None` leaves it read-only with
    /// respect to new keys. `path_transform`, if given, is applied to each
    /// loaded key before insertion.
    pub fn load(
        manifest_path: &Path,
        root: Option<PathBuf>,
        path_transform: Option<&dyn Fn(RelPath) -> RelPath>,
    ) -> SyncResult<Self> {
        let buf = std::fs::read(manifest_path)?;
        let parsed: Vec<ManifestEntry> = codec::decode(&buf)?;
        let mut entries = HashMap::with_capacity(parsed.len());
        for ManifestEntry { digest, path } in parsed {
            let path = match path_transform {
                Some(f) => f(path),
                None => path,
            };
            entries.insert(path, digest);
        }
        Ok(HashCache {
            entries: RefCell::new(entries),
            root,
        })
    }

    /// Serialize the cache's current entries with the binary codec and
    /// write them to `path`. Not atomic; callers write to a temp path and
    /// rename.
    pub fn write(&self, path: &Path) -> SyncResult<()> {
        let entries = self.entries.borrow();
        let bytes = codec::encode(entries.iter())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Number of entries currently held (does not trigger digestion).
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Look up a path, lazily digesting it from the bound root if it's
    /// absent from the map but exists as a regular file underneath. A
    /// missing file under a bound root is "no entry", not an I/O error.
    fn get_or_digest(&self, path: &RelPath) -> SyncResult<Option<Digest>> {
        if let Some(d) = self.entries.borrow().get(path) {
            return Ok(Some(*d));
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let full = root.join(path.as_str());
        match hash::hash_regular_file(&full)? {
            Some(digest) => {
                tracing::debug!(path = %path, "lazily digested");
                self.entries.borrow_mut().insert(path.clone(), digest);
                Ok(Some(digest))
            }
            None => Ok(None),
        }
    }

    /// Paths `p` such that `p` is a key in `peer` and either the receiver
    /// has no entry for `p` (after attempting lazy digestion if bound) or
    /// the digests differ. Does not include keys present only in the
    /// receiver — callers wanting both directions call this twice with
    /// operands swapped.
    pub fn difference(&self, peer: &HashCache) -> SyncResult<Vec<RelPath>> {
        let peer_entries = peer.entries.borrow().clone();
        let mut out = Vec::new();
        for (path, peer_digest) in peer_entries {
            match self.get_or_digest(&path)? {
                Some(own_digest) if own_digest == peer_digest => {}
                _ => out.push(path),
            }
        }
        Ok(out)
    }
}
