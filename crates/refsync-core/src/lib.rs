//! refsync-core: shared types, config schema, error types, and the observer-site primitive.

pub mod config;
pub mod error;
pub mod observer;
pub mod types;

pub use error::{SyncError, SyncResult};
pub use types::{Digest, ProgressState, RelPath};
