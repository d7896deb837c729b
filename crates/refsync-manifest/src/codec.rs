//! Binary manifest codec.
//!
//! ```text
//! manifest := count:u32, entry{count}
//! entry    := digest:byte[32], path_len:u32, path:byte[path_len]   // UTF-8
//! ```
//!
//! All integers are little-endian. This pins the open byte-order question
//! left by the reference (which wrote `int32` via a platform default-endian
//! buffer) to an explicit, documented choice. No framing, no checksum, no
//! version tag. EOF must coincide with the end of the last entry.

use refsync_core::{RelPath, SyncError, SyncResult};
use std::io::Write;

/// Cap carried over from the reference implementation: applies to the
/// manifest *file* itself, not to per-file content hashing (see
/// `refsync_manifest::hash`, which streams files of any size).
pub const MAX_MANIFEST_BYTES: u64 = i32::MAX as u64;

/// A single decoded `(path, digest)` pair, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub digest: refsync_core::Digest,
    pub path: RelPath,
}

/// Serialize entries to the binary wire format. Entries are written in
/// whatever order they're given; callers needing a stable order should sort
/// beforehand. Writing is not atomic — callers write to a temp path and
/// rename.
pub fn encode<'a, I>(entries: I) -> SyncResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a RelPath, &'a refsync_core::Digest)>,
{
    let mut out = Vec::new();
    let entries: Vec<_> = entries.into_iter().collect();
    let count: u32 = entries
        .len()
        .try_into()
        .map_err(|_| SyncError::ManifestMalformed("too many entries for u32 count".into()))?;
    out.write_all(&count.to_le_bytes())?;
    for (path, digest) in entries {
        out.write_all(digest.as_bytes())?;
        let path_bytes = path.as_str().as_bytes();
        let path_len: u32 = path_bytes.len().try_into().map_err(|_| {
            SyncError::ManifestMalformed(format!("path too long: {}", path.as_str()))
        })?;
        out.write_all(&path_len.to_le_bytes())?;
        out.write_all(path_bytes)?;
    }
    Ok(out)
}

/// Parse a manifest fully loaded into memory. Fails with
/// `ManifestMalformed` if the declared count can't be satisfied, a path
/// length would overrun the buffer, the buffer contains trailing bytes
/// after the last entry, or the buffer itself exceeds
/// [`MAX_MANIFEST_BYTES`].
pub fn decode(buf: &[u8]) -> SyncResult<Vec<ManifestEntry>> {
    if buf.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(SyncError::ManifestMalformed(format!(
            "manifest of {} bytes exceeds {} byte cap",
            buf.len(),
            MAX_MANIFEST_BYTES
        )));
    }

    let mut pos = 0usize;
    let count = read_u32(buf, &mut pos)?;

    const MIN_ENTRY_LEN: usize = refsync_core::Digest::LEN + 4;
    if count as usize > buf.len() / MIN_ENTRY_LEN {
        return Err(SyncError::ManifestMalformed(format!(
            "declared count {count} cannot be satisfied by a {} byte buffer",
            buf.len()
        )));
    }
    let mut entries = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let mut digest_bytes = [0u8; refsync_core::Digest::LEN];
        read_exact(buf, &mut pos, &mut digest_bytes)?;
        let digest = refsync_core::Digest::from_bytes(digest_bytes);

        let path_len = read_u32(buf, &mut pos)? as usize;
        if pos + path_len > buf.len() {
            return Err(SyncError::ManifestMalformed(format!(
                "path of length {path_len} at offset {pos} overruns manifest buffer of {} bytes",
                buf.len()
            )));
        }
        let path_bytes = &buf[pos..pos + path_len];
        pos += path_len;
        let raw = std::str::from_utf8(path_bytes)
            .map_err(|e| SyncError::ManifestMalformed(format!("path is not UTF-8: {e}")))?;
        let path = RelPath::parse(raw)
            .ok_or_else(|| SyncError::ManifestMalformed(format!("invalid relative path: {raw}")))?;

        entries.push(ManifestEntry { digest, path });
    }

    if pos != buf.len() {
        return Err(SyncError::ManifestMalformed(format!(
            "{} trailing byte(s) after last entry",
            buf.len() - pos
        )));
    }

    Ok(entries)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> SyncResult<u32> {
    let mut bytes = [0u8; 4];
    read_exact(buf, pos, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_exact(buf: &[u8], pos: &mut usize, out: &mut [u8]) -> SyncResult<()> {
    let end = *pos + out.len();
    if end > buf.len() {
        return Err(SyncError::ManifestMalformed(format!(
            "unexpected EOF at offset {}: needed {} more byte(s), {} remain",
            pos,
            out.len(),
            buf.len().saturating_sub(*pos)
        )));
    }
    out.copy_from_slice(&buf[*pos..end]);
    *pos = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use refsync_core::Digest;
    use proptest::prelude::*;

    fn entry(path: &str, byte: u8) -> (RelPath, Digest) {
        (RelPath::parse(path).unwrap(), Digest::from_bytes([byte; 32]))
    }

    #[test]
    fn roundtrip_empty() {
        let encoded = encode(std::iter::empty()).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn roundtrip_several_entries() {
        let entries = vec![entry("a.txt", 1), entry("sub/b.txt", 2), entry("c.bin", 3)];
        let encoded = encode(entries.iter().map(|(p, d)| (p, d))).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].path.as_str(), "a.txt");
        assert_eq!(decoded[0].digest, entries[0].1);
        assert_eq!(decoded[2].path.as_str(), "c.bin");
    }

    #[test]
    fn decode_rejects_truncated_buffer() {
        let entries = vec![entry("a.txt", 9)];
        let mut encoded = encode(entries.iter().map(|(p, d)| (p, d))).unwrap();
        encoded.truncate(encoded.len() - 2);
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn decode_rejects_trailing_garbage() {
        let entries = vec![entry("a.txt", 9)];
        let mut encoded = encode(entries.iter().map(|(p, d)| (p, d))).unwrap();
        encoded.extend_from_slice(&[0xff, 0xff]);
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn decode_rejects_path_length_overrun() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 32]);
        buf.extend_from_slice(&1000u32.to_le_bytes());
        buf.extend_from_slice(b"short");
        assert!(decode(&buf).is_err());
    }

    proptest! {
        #[test]
        fn codec_roundtrip_arbitrary_paths(
            names in proptest::collection::vec("[a-zA-Z0-9_]{1,12}", 0..8),
            byte in any::<u8>(),
        ) {
            let entries: Vec<(RelPath, Digest)> = names
                .into_iter()
                .enumerate()
                .map(|(i, n)| entry(&n, byte.wrapping_add(i as u8)))
                .collect();
            let encoded = encode(entries.iter().map(|(p, d)| (p, d))).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded.len(), entries.len());
        }
    }
}
