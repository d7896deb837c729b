//! Core data types shared by every refsync crate: the content digest, the
//! relative-path newtype, and the orchestrator's transient progress enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A SHA-256 content digest (32 bytes, 256 bits). Equality is byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex string (64 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-char lowercase/uppercase hex string into a digest.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Digest(out))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A `/`-separated relative path, as it appears in a manifest or as a key in
/// a hash cache. Never begins with `/` and never contains a `..` segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelPath(String);

impl RelPath {
    /// Build a `RelPath` from a path string loaded from a manifest. Rejects
    /// absolute paths and `..` segments, since the manifest may originate
    /// from an untrusted server (spec.md §3 notes the reference trusts the
    /// file; this rewrite rejects defensively instead).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.starts_with('/') {
            return None;
        }
        if raw.split('/').any(|seg| seg == "..") {
            return None;
        }
        Some(RelPath(raw.to_string()))
    }

    /// Build a `RelPath` from a filesystem path relative to some root,
    /// normalizing native separators to `/`. Used when walking a live
    /// directory tree, where the input is trusted by construction.
    pub fn from_local(rel: &std::path::Path) -> Self {
        let s = rel.to_string_lossy().replace('\\', "/");
        RelPath(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Transient progress labels published to observers during a single
/// `Orchestrator::run`. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressState {
    Init,
    CopyingHashManifest,
    DownloadingHashManifest,
    ComparingFiles,
    DeletingFiles,
    DownloadingFiles,
    UpdatingHashManifest,
    CleanUp,
    Fail,
    Done,
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressState::Init => "INIT",
            ProgressState::CopyingHashManifest => "COPYING_HASH_MANIFEST",
            ProgressState::DownloadingHashManifest => "DOWNLOADING_HASH_MANIFEST",
            ProgressState::ComparingFiles => "COMPARING_FILES",
            ProgressState::DeletingFiles => "DELETING_FILES",
            ProgressState::DownloadingFiles => "DOWNLOADING_FILES",
            ProgressState::UpdatingHashManifest => "UPDATING_HASH_MANIFEST",
            ProgressState::CleanUp => "CLEAN_UP",
            ProgressState::Fail => "FAIL",
            ProgressState::Done => "DONE",
        };
        write!(f, "{s}")
    }
}
