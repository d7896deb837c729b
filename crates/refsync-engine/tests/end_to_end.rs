//! End-to-end update-cycle scenarios against a fake HTTP server.

use axum::extract::Path as AxumPath;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use refsync_core::config::DownloaderConfig;
use refsync_core::{Digest, ProgressState, RelPath};
use refsync_engine::{Orchestrator, RunConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

fn digest_of(bytes: &[u8]) -> Digest {
    refsync_manifest::hash_bytes(bytes)
}

fn build_manifest(files: &[(&str, &[u8])]) -> Vec<u8> {
    let entries: Vec<(RelPath, Digest)> = files
        .iter()
        .map(|(p, b)| (RelPath::parse(p).unwrap(), digest_of(b)))
        .collect();
    refsync_manifest::encode(entries.iter().map(|(p, d)| (p, d))).unwrap()
}

/// Spawn a fake archive server serving `files` (relative path -> bytes) and
/// the manifest built from them at `/manifest.hash`. Serving a path listed
/// in `fail_paths` returns a 500 instead.
async fn spawn_archive(
    files: Vec<(&'static str, &'static [u8])>,
    fail_paths: Vec<&'static str>,
) -> SocketAddr {
    let manifest_bytes = build_manifest(&files);
    let file_map: HashMap<String, &'static [u8]> =
        files.into_iter().map(|(p, b)| (p.to_string(), b)).collect();
    let fail_set: std::collections::HashSet<String> =
        fail_paths.into_iter().map(String::from).collect();

    let state = Arc::new((manifest_bytes, file_map, fail_set));

    let app = Router::new()
        .route(
            "/manifest.hash",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async move { state.0.clone() }
                }
            }),
        )
        .route(
            "/*path",
            get({
                let state = state.clone();
                move |AxumPath(path): AxumPath<String>| {
                    let state = state.clone();
                    async move {
                        if state.2.contains(&path) {
                            return Err(StatusCode::INTERNAL_SERVER_ERROR);
                        }
                        match state.1.get(&path) {
                            Some(bytes) => Ok(bytes.to_vec()),
                            None => Err(StatusCode::NOT_FOUND),
                        }
                    }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn run_config(root: &std::path::Path, addr: SocketAddr) -> RunConfig {
    RunConfig {
        root: root.to_path_buf(),
        manifest_url: format!("http://{addr}/manifest.hash"),
        manifest_name: "manifest.hash".to_string(),
        archive_prefix: format!("http://{addr}/"),
        skiplist_name: None,
    }
}

fn downloader_config() -> DownloaderConfig {
    DownloaderConfig {
        connection_count: 4,
        buffer_length: 16,
        connection_timeout_ms: 5000,
    }
}

#[tokio::test]
async fn s1_clean_install() {
    let addr = spawn_archive(
        vec![("a.txt", b"AAA"), ("sub/b.txt", b"BBB"), ("c.bin", b"CCC")],
        vec![],
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();

    let outcome = orchestrator
        .run(&run_config(dir.path(), addr))
        .await
        .unwrap();

    assert_eq!(outcome.final_state, ProgressState::Done);
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"AAA");
    assert_eq!(std::fs::read(dir.path().join("sub/b.txt")).unwrap(), b"BBB");
    assert!(dir.path().join("manifest.hash").is_file());
    assert!(!dir.path().join("manifest.hash.tmp").exists());
}

#[tokio::test]
async fn s2_no_op() {
    let addr = spawn_archive(vec![("a.txt", b"AAA")], vec![]).await;
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();
    let config = run_config(dir.path(), addr);

    orchestrator.run(&config).await.unwrap();
    orchestrator.shutdown(100).await;

    let orchestrator2 = Orchestrator::new(&downloader_config()).unwrap();
    let outcome = orchestrator2.run(&config).await.unwrap();

    assert_eq!(outcome.final_state, ProgressState::Done);
    assert_eq!(outcome.deleted, 0);
}

#[tokio::test]
async fn s3_delete_only() {
    let addr = spawn_archive(vec![("a.txt", b"AAA")], vec![]).await;
    let dir = tempfile::tempdir().unwrap();

    std::fs::write(dir.path().join("a.txt"), b"AAA").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"STALE").unwrap();
    let stored = build_manifest(&[("a.txt", b"AAA"), ("b.txt", b"STALE")]);
    std::fs::write(dir.path().join("manifest.hash"), stored).unwrap();

    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();
    let outcome = orchestrator
        .run(&run_config(dir.path(), addr))
        .await
        .unwrap();

    assert_eq!(outcome.final_state, ProgressState::Done);
    assert!(!dir.path().join("b.txt").exists());
    assert!(dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn s4_change_only() {
    let addr = spawn_archive(vec![("a.txt", b"NEWDATA")], vec![]).await;
    let dir = tempfile::tempdir().unwrap();

    std::fs::write(dir.path().join("a.txt"), b"OLDDATA").unwrap();
    let stored = build_manifest(&[("a.txt", b"OLDDATA")]);
    std::fs::write(dir.path().join("manifest.hash"), stored).unwrap();

    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();
    let outcome = orchestrator
        .run(&run_config(dir.path(), addr))
        .await
        .unwrap();

    assert_eq!(outcome.final_state, ProgressState::Done);
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"NEWDATA");
}

#[tokio::test]
async fn s5_skiplist_excludes_path() {
    let addr = spawn_archive(vec![("a.txt", b"NEWDATA"), ("b.txt", b"BBB")], vec![]).await;
    let dir = tempfile::tempdir().unwrap();

    std::fs::write(dir.path().join("a.txt"), b"OLDDATA").unwrap();
    let stored = build_manifest(&[("a.txt", b"OLDDATA")]);
    std::fs::write(dir.path().join("manifest.hash"), stored).unwrap();
    std::fs::write(dir.path().join("skip.txt"), "a.txt\n").unwrap();

    let mut config = run_config(dir.path(), addr);
    config.skiplist_name = Some("skip.txt".to_string());

    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();
    let outcome = orchestrator.run(&config).await.unwrap();

    assert_eq!(outcome.final_state, ProgressState::Done);
    assert_eq!(
        std::fs::read(dir.path().join("a.txt")).unwrap(),
        b"OLDDATA",
        "skiplisted file must be left untouched"
    );
    assert_eq!(std::fs::read(dir.path().join("b.txt")).unwrap(), b"BBB");
}

#[tokio::test]
async fn s6_partial_failure_does_not_commit_manifest() {
    let addr = spawn_archive(
        vec![("a.txt", b"AAA"), ("b.txt", b"BBB")],
        vec!["b.txt"],
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let orchestrator = Orchestrator::new(&downloader_config()).unwrap();
    let outcome = orchestrator.run(&run_config(dir.path(), addr)).await.unwrap();

    assert_eq!(outcome.final_state, ProgressState::Fail);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].as_str(), "b.txt");
    assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"AAA");
    assert!(
        !dir.path().join("manifest.hash").exists(),
        "manifest must not commit on partial failure"
    );
    assert!(!dir.path().join("manifest.hash.tmp").exists());
}
