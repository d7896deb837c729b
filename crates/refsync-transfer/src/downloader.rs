//! Bounded-concurrency async downloader: streams HTTP bodies to disk,
//! uses `Last-Modified` (plus `Content-Length`) as a cheap freshness check,
//! and tracks two bandwidth counters shared across all in-flight fetches.

use refsync_core::config::DownloaderConfig;
use refsync_core::{SyncError, SyncResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Outcome of a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// `true` if the freshness short-circuit fired and no bytes transferred.
    pub skipped: bool,
    pub bytes_transferred: u64,
}

/// Bounded-concurrency downloader. Cheap to clone: every field is an `Arc`
/// or `Copy` value, so handing a clone to each spawned fetch task is the
/// idiomatic way to share it.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    semaphore: Arc<tokio::sync::Semaphore>,
    capacity: usize,
    bytes_downloaded: Arc<AtomicU64>,
    bytes_remaining: Arc<AtomicI64>,
    accepting: Arc<AtomicBool>,
    buffer_length: usize,
}

impl Downloader {
    pub fn new(config: &DownloaderConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connection_timeout_ms))
            .timeout(Duration::from_millis(config.connection_timeout_ms))
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Downloader {
            client,
            semaphore: Arc::new(tokio::sync::Semaphore::new(config.connection_count)),
            capacity: config.connection_count,
            bytes_downloaded: Arc::new(AtomicU64::new(0)),
            bytes_remaining: Arc::new(AtomicI64::new(0)),
            accepting: Arc::new(AtomicBool::new(true)),
            buffer_length: config.buffer_length,
        })
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::SeqCst)
    }

    /// Approximate; never allowed to read as negative to callers even
    /// though the internal accumulator is signed to tolerate the
    /// finalization subtraction in step 6 of the fetch algorithm.
    pub fn remaining_bytes(&self) -> u64 {
        self.bytes_remaining.load(Ordering::SeqCst).max(0) as u64
    }

    /// Stop accepting new work and wait up to `timeout_ms` for the
    /// semaphore to show every permit released, i.e. no fetch still
    /// holding a slot. Scoped acquisition of the downloader at update
    /// start/end guarantees this runs on every exit path.
    pub async fn shutdown(&self, timeout_ms: u64) {
        self.accepting.store(false, Ordering::SeqCst);
        let capacity = self.capacity;
        let drained = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            loop {
                if self.semaphore.available_permits() >= capacity {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("downloader shutdown timed out with fetches still in flight");
        }
    }

    /// Fetch `url` into `destination`. At most `connection_count` fetches
    /// run at once; callers beyond that block inside this call until a
    /// slot frees, which is the cooperative-task equivalent of "queueing".
    pub async fn enqueue(&self, url: &str, destination: &Path, force: bool) -> SyncResult<FetchOutcome> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SyncError::Network("downloader is shut down".into()));
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SyncError::Network("downloader semaphore closed".into()))?;

        let response = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let content_length = response.content_length();
        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| httpdate::parse_http_date(s).ok());

        if let Some(len) = content_length {
            self.bytes_remaining.fetch_add(len as i64, Ordering::SeqCst);
        }

        if !force {
            if let Some(outcome) = self.try_freshness_short_circuit(destination, last_modified, content_length)? {
                if let Some(len) = content_length {
                    self.bytes_remaining.fetch_sub(len as i64, Ordering::SeqCst);
                }
                return Ok(outcome);
            }
        }

        let result = self
            .stream_to_file(response, destination, content_length)
            .await;

        if let Some(len) = content_length {
            // Honest accounting on every exit path, including failure: any
            // portion of the announced length we never actually read is
            // removed from the shared remaining-bytes counter.
            let transferred = result.as_ref().map(|o| o.bytes_transferred).unwrap_or(0);
            let unconsumed = (len as i64) - (transferred as i64);
            if unconsumed > 0 {
                self.bytes_remaining.fetch_sub(unconsumed, Ordering::SeqCst);
            }
        }

        let outcome = result?;

        if let Some(modified) = last_modified {
            set_mtime(destination, modified)?;
        }

        Ok(outcome)
    }

    fn try_freshness_short_circuit(
        &self,
        destination: &Path,
        last_modified: Option<SystemTime>,
        content_length: Option<u64>,
    ) -> SyncResult<Option<FetchOutcome>> {
        let Some(modified) = last_modified else {
            return Ok(None);
        };
        let metadata = match std::fs::metadata(destination) {
            Ok(m) if m.is_file() => m,
            _ => return Ok(None),
        };
        let Ok(local_modified) = metadata.modified() else {
            return Ok(None);
        };
        if !mtime_eq(local_modified, modified) {
            return Ok(None);
        }
        // Strengthening beyond the reference: also require content-length
        // to match the local file size before trusting the mtime alone.
        if let Some(len) = content_length {
            if metadata.len() != len {
                return Ok(None);
            }
        }
        Ok(Some(FetchOutcome {
            skipped: true,
            bytes_transferred: 0,
        }))
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        destination: &Path,
        _content_length: Option<u64>,
    ) -> SyncResult<FetchOutcome> {
        use futures::StreamExt;
        use tokio::io::AsyncReadExt;

        let file = tokio::fs::File::create(destination).await?;
        let byte_stream = response
            .bytes_stream()
            .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        let mut reader = tokio_util::io::StreamReader::new(byte_stream);

        let mut block_index: u64 = 0;
        let mut writes = Vec::new();
        let abort = Arc::new(AtomicBool::new(false));

        loop {
            let mut buf = vec![0u8; self.buffer_length];
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| SyncError::Network(e.to_string()))?;
            if n == 0 {
                break;
            }
            buf.truncate(n);

            self.bytes_downloaded
                .fetch_add(n as u64, Ordering::SeqCst);
            self.bytes_remaining.fetch_sub(n as i64, Ordering::SeqCst);

            let mut handle = file.try_clone().await?;
            let write_offset = block_index * self.buffer_length as u64;
            let abort_flag = abort.clone();
            writes.push(tokio::spawn(async move {
                if abort_flag.load(Ordering::SeqCst) {
                    return Ok(0usize);
                }
                if let Err(e) = handle.seek(std::io::SeekFrom::Start(write_offset)).await {
                    abort_flag.store(true, Ordering::SeqCst);
                    return Err(e);
                }
                let expected = buf.len();
                match handle.write_all(&buf).await {
                    Ok(()) => Ok(expected),
                    Err(e) => {
                        abort_flag.store(true, Ordering::SeqCst);
                        Err(e)
                    }
                }
            }));
            block_index += 1;
        }

        let mut total_written: u64 = 0;
        for write in writes {
            let written = write
                .await
                .map_err(|e| SyncError::Network(format!("write task panicked: {e}")))??;
            total_written += written as u64;
        }

        if abort.load(Ordering::SeqCst) {
            return Err(SyncError::Filesystem(std::io::Error::new(
                std::io::ErrorKind::Other,
                "a positioned write failed mid-transfer",
            )));
        }

        Ok(FetchOutcome {
            skipped: false,
            bytes_transferred: total_written,
        })
    }
}

fn mtime_eq(local: SystemTime, remote: SystemTime) -> bool {
    let to_millis = |t: SystemTime| -> i64 {
        t.duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    };
    to_millis(local) == to_millis(remote)
}

fn set_mtime(path: &Path, modified: SystemTime) -> SyncResult<()> {
    let file = std::fs::File::open(path)?;
    file.set_modified(modified)?;
    Ok(())
}
