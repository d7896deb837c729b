//! Event payloads published by the orchestrator. Presentation collaborators
//! (a text console, a windowed progress bar) subscribe to these sites and
//! render them; the orchestrator never formats output itself.

use refsync_core::{ProgressState, RelPath};

/// A file-level event raised during `DELETING_FILES` or `DOWNLOADING_FILES`.
#[derive(Debug, Clone)]
pub enum FileEvent {
    Deleted { path: RelPath },
    Downloaded {
        path: RelPath,
        bytes_downloaded: u64,
        bytes_remaining: u64,
    },
}

/// An error surfaced during a fetch or filesystem operation. Per-fetch
/// errors carry the offending path; setup/commit errors do not.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub path: Option<RelPath>,
    pub message: String,
}

/// The three observer sites an orchestrator run publishes to.
#[derive(Default)]
pub struct Observers {
    pub progress: refsync_core::observer::ObserverSite<ProgressState>,
    pub file: refsync_core::observer::ObserverSite<FileEvent>,
    pub error: refsync_core::observer::ObserverSite<ErrorEvent>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }
}
