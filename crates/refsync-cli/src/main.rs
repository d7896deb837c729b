//! refsync: client CLI driving a single update cycle against a published
//! manifest.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use refsync_core::config::RefsyncConfig;
use refsync_core::ProgressState;
use refsync_engine::{ErrorEvent, FileEvent, Orchestrator, RunConfig};
use std::path::PathBuf;
use std::time::Duration;

struct Args {
    root: Option<PathBuf>,
    config_path: Option<PathBuf>,
    no_ui: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let mut root = None;
    let mut config_path = None;
    let mut no_ui = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "-root" | "-r" => {
                let dir = it
                    .next()
                    .context("-root|-r requires a directory argument")?;
                root = Some(PathBuf::from(dir));
            }
            "-config" | "-c" => {
                let path = it
                    .next()
                    .context("-config|-c requires a file path argument")?;
                config_path = Some(PathBuf::from(path));
            }
            "-noui" | "-commandline" | "-cl" => no_ui = true,
            other => anyhow::bail!("unknown flag: {other} (try -help)"),
        }
    }

    Ok(Some(Args {
        root,
        config_path,
        no_ui,
    }))
}

fn print_usage() {
    println!(
        "usage: refsync [-root|-r <dir>] [-config|-c <file>] [-noui|-commandline|-cl] [-help|-h]"
    );
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RefsyncConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file: {}", path.display()))?;
            RefsyncConfig::from_toml(&text)
                .with_context(|| format!("parsing config file: {}", path.display()))
        }
        None => Ok(RefsyncConfig::default()),
    }
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut config = load_config(args.config_path.as_ref())?;
    if let Some(root) = args.root {
        config.client.root = root;
    }

    init_logging(&config.logging.level, &config.logging.format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.client.root.display(),
        "refsync starting"
    );

    let mut orchestrator = Orchestrator::new(&config.downloader)?;

    if args.no_ui {
        orchestrator.observers.progress.subscribe(|state: &ProgressState| {
            println!("{state}");
        });
        orchestrator.observers.file.subscribe(|event: &FileEvent| match event {
            FileEvent::Deleted { path } => println!("deleted {path}"),
            FileEvent::Downloaded { path, bytes_downloaded, .. } => {
                println!("downloaded {path} ({bytes_downloaded} bytes so far)")
            }
        });
        orchestrator.observers.error.subscribe(|event: &ErrorEvent| {
            eprintln!("error: {}", event.message);
        });
    } else {
        let pb = make_progress_bar();
        let pb_progress = pb.clone();
        orchestrator.observers.progress.subscribe(move |state: &ProgressState| {
            pb_progress.set_prefix(state.to_string());
        });
        let pb_file = pb.clone();
        orchestrator.observers.file.subscribe(move |event: &FileEvent| match event {
            FileEvent::Deleted { path } => pb_file.set_message(format!("deleted {path}")),
            FileEvent::Downloaded { path, .. } => {
                pb_file.set_message(format!("downloaded {path}"))
            }
        });
        let pb_error = pb.clone();
        orchestrator.observers.error.subscribe(move |event: &ErrorEvent| {
            pb_error.println(format!("error: {}", event.message));
        });
    }

    let run_config = RunConfig {
        root: config.client.root.clone(),
        manifest_url: config.client.manifest_url.clone(),
        manifest_name: config.client.manifest_name.clone(),
        archive_prefix: config.client.archive_prefix.clone(),
        skiplist_name: config.client.skiplist_name.clone(),
    };

    let outcome = orchestrator.run(&run_config).await;
    orchestrator.shutdown(30_000).await;

    match outcome {
        Ok(outcome) if outcome.final_state == ProgressState::Done => {
            tracing::info!(downloaded = outcome.downloaded, deleted = outcome.deleted, "update complete");
            Ok(())
        }
        Ok(outcome) => {
            anyhow::bail!(
                "update finished with failures: {} file(s) failed to download",
                outcome.failed.len()
            )
        }
        Err(e) => Err(e.into()),
    }
}
