//! The state machine driving a single update cycle: manifest acquisition,
//! set-difference computation, deletion, parallel download, and manifest
//! commit.

use crate::events::{ErrorEvent, FileEvent, Observers};
use refsync_core::config::DownloaderConfig;
use refsync_core::{ProgressState, RelPath, SyncError, SyncResult};
use refsync_manifest::HashCache;
use refsync_transfer::{encode_path, Downloader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pre-conditions for a single `Orchestrator::run` call.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub manifest_url: String,
    pub manifest_name: String,
    pub archive_prefix: String,
    pub skiplist_name: Option<String>,
}

impl RunConfig {
    fn stored_manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_name)
    }

    fn staging_manifest_path(&self) -> PathBuf {
        self.root.join(format!("{}.tmp", self.manifest_name))
    }

    fn skiplist_path(&self) -> Option<PathBuf> {
        self.skiplist_name.as_ref().map(|n| self.root.join(n))
    }
}

/// Outcome of one completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_state: ProgressState,
    pub downloaded: usize,
    pub deleted: usize,
    pub failed: Vec<RelPath>,
}

pub struct Orchestrator {
    downloader: Downloader,
    pub observers: Observers,
    shutdown_timeout_ms: u64,
}

impl Orchestrator {
    pub fn new(downloader_config: &DownloaderConfig) -> SyncResult<Self> {
        Ok(Orchestrator {
            downloader: Downloader::new(downloader_config)?,
            observers: Observers::new(),
            shutdown_timeout_ms: downloader_config.connection_timeout_ms,
        })
    }

    fn publish(&self, state: ProgressState) {
        debug!(%state, "progress");
        self.observers.progress.notify(&state);
    }

    /// Run one full update cycle. Always reaches `CLEAN_UP` and publishes
    /// exactly one of `DONE`/`FAIL` as the final progress event, even on
    /// error paths. The downloader's worker pool is drained before this
    /// returns, on every exit path, regardless of whether the caller also
    /// invokes `shutdown` itself.
    pub async fn run(&self, config: &RunConfig) -> SyncResult<RunOutcome> {
        self.publish(ProgressState::Init);
        let outcome = self.run_inner(config).await;
        match &outcome {
            Ok(o) => self.publish(o.final_state),
            Err(_) => self.publish(ProgressState::Fail),
        }
        self.downloader.shutdown(self.shutdown_timeout_ms).await;
        outcome
    }

    async fn run_inner(&self, config: &RunConfig) -> SyncResult<RunOutcome> {
        let stored = config.stored_manifest_path();
        let staging = config.staging_manifest_path();

        self.publish(ProgressState::CopyingHashManifest);
        if stored.is_file() {
            std::fs::copy(&stored, &staging)?;
        }

        self.publish(ProgressState::DownloadingHashManifest);
        let manifest_fetch = self
            .downloader
            .enqueue(&config.manifest_url, &staging, false)
            .await;
        if let Err(e) = manifest_fetch {
            self.observers.error.notify(&ErrorEvent {
                path: None,
                message: e.to_string(),
            });
            let _ = std::fs::remove_file(&staging);
            self.publish(ProgressState::CleanUp);
            return Err(e);
        }

        self.publish(ProgressState::ComparingFiles);
        let new_cache = HashCache::load(&staging, None, None)?;
        let old_cache = if stored.is_file() {
            HashCache::load(&stored, Some(config.root.clone()), None)?
        } else {
            HashCache::bound_empty(config.root.clone())
        };

        let mut to_download: HashSet<RelPath> =
            old_cache.difference(&new_cache)?.into_iter().collect();
        let mut to_delete: HashSet<RelPath> =
            new_cache.difference(&old_cache)?.into_iter().collect();

        if let Some(skiplist_path) = config.skiplist_path() {
            if skiplist_path.is_file() {
                let skipped = read_skiplist(&skiplist_path)?;
                for path in &skipped {
                    to_download.remove(path);
                    to_delete.remove(path);
                }
            }
        }

        if !to_delete.is_empty() {
            self.publish(ProgressState::DeletingFiles);
            for path in &to_delete {
                self.delete_one(&config.root, path);
            }
        }

        let mut failed = Vec::new();
        if !to_download.is_empty() {
            self.publish(ProgressState::DownloadingFiles);
            failed = self.download_all(config, &to_download).await;
        }

        let success = failed.is_empty();

        // Open-question resolution: commit only on full success, rather
        // than unconditionally as the reference does, so a partial failure
        // never leaves the stored manifest claiming files that don't exist.
        if success {
            self.publish(ProgressState::UpdatingHashManifest);
            std::fs::copy(&staging, &stored)?;
        }

        self.publish(ProgressState::CleanUp);
        let _ = std::fs::remove_file(&staging);

        Ok(RunOutcome {
            final_state: if success {
                ProgressState::Done
            } else {
                ProgressState::Fail
            },
            downloaded: to_download.len() - failed.len(),
            deleted: to_delete.len(),
            failed,
        })
    }

    fn delete_one(&self, root: &Path, path: &RelPath) {
        let full = root.join(path.as_str());
        match std::fs::remove_file(&full) {
            Ok(()) => {
                self.observers.file.notify(&FileEvent::Deleted { path: path.clone() });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.observers.file.notify(&FileEvent::Deleted { path: path.clone() });
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to delete file");
                self.observers.error.notify(&ErrorEvent {
                    path: Some(path.clone()),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Schedule every fetch concurrently (bounded by the downloader's own
    /// semaphore); any fetch failure flips the run's outcome but does not
    /// abort sibling fetches already scheduled.
    async fn download_all(
        &self,
        config: &RunConfig,
        to_download: &HashSet<RelPath>,
    ) -> Vec<RelPath> {
        let fetches = to_download.iter().cloned().map(|path| {
            async move {
                let url = format!("{}{}", config.archive_prefix, encode_path(path.as_str()));
                let dest = config.root.join(path.as_str());
                if let Some(parent) = dest.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        self.observers.error.notify(&ErrorEvent {
                            path: Some(path.clone()),
                            message: e.to_string(),
                        });
                        return Err(path);
                    }
                }
                if let Err(e) = tokio::fs::File::create(&dest).await {
                    self.observers.error.notify(&ErrorEvent {
                        path: Some(path.clone()),
                        message: e.to_string(),
                    });
                    return Err(path);
                }
                match self.downloader.enqueue(&url, &dest, true).await {
                    Ok(_) => {
                        self.observers.file.notify(&FileEvent::Downloaded {
                            path: path.clone(),
                            bytes_downloaded: self.downloader.downloaded_bytes(),
                            bytes_remaining: self.downloader.remaining_bytes(),
                        });
                        info!(path = %path, "downloaded");
                        Ok(())
                    }
                    Err(e) => {
                        self.observers.error.notify(&ErrorEvent {
                            path: Some(path.clone()),
                            message: e.to_string(),
                        });
                        Err(path)
                    }
                }
            }
        });

        let results = futures::future::join_all(fetches).await;
        results.into_iter().filter_map(|r| r.err()).collect()
    }

    /// Release the downloader's worker pool, bounded by `timeout_ms`.
    /// Callers should invoke this once on every exit path from a session
    /// that scoped a `Downloader` to an `Orchestrator`'s lifetime.
    pub async fn shutdown(&self, timeout_ms: u64) {
        self.downloader.shutdown(timeout_ms).await;
    }
}

fn read_skiplist(path: &Path) -> SyncResult<Vec<RelPath>> {
    let text = std::fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match RelPath::parse(line) {
            Some(p) => out.push(p),
            None => {
                return Err(SyncError::Config(format!(
                    "invalid path in skiplist: {line}"
                )))
            }
        }
    }
    Ok(out)
}
