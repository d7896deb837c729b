//! refsync-manifest: the binary manifest codec, SHA-256 content hashing,
//! and the hash cache that ties them together.

pub mod cache;
pub mod codec;
pub mod hash;

pub use cache::HashCache;
pub use codec::{decode, encode, ManifestEntry, MAX_MANIFEST_BYTES};
pub use hash::{hash_bytes, hash_file, hash_regular_file};
