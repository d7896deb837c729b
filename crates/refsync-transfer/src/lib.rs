//! refsync-transfer: path-to-URL percent-encoding and the bounded-concurrency
//! async downloader.

pub mod downloader;
pub mod encode;

pub use downloader::{Downloader, FetchOutcome};
pub use encode::encode_path;
