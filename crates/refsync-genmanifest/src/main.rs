//! refsync-genmanifest: walks a directory tree and writes the binary hash
//! manifest the client downloads and compares against.

use anyhow::{Context, Result};
use refsync_manifest::HashCache;
use std::path::PathBuf;

struct Args {
    root: PathBuf,
    out: PathBuf,
    name: String,
}

fn parse_args() -> Result<Option<Args>> {
    let mut root: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut name = "manifest.hash".to_string();

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
            "-out" | "-o" => {
                let dir = it.next().context("-out|-o requires a directory argument")?;
                out = Some(PathBuf::from(dir));
            }
            "-name" | "-n" => {
                name = it.next().context("-name|-n requires a file name argument")?;
            }
            other => anyhow::bail!("unknown flag: {other} (try -help)"),
        }
    }

    let root = root.unwrap_or_else(|| PathBuf::from("."));
    let out = out.unwrap_or_else(|| root.clone());

    Ok(Some(Args { root, out, name }))
}

fn print_usage() {
    println!(
        "usage: refsync-genmanifest [-root|-r <dir>] [-out|-o <dir>] [-name|-n <file>] [-help|-h]"
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    tracing::info!(root = %args.root.display(), "walking directory tree");
    let cache = HashCache::from_directory(&args.root)
        .with_context(|| format!("walking root: {}", args.root.display()))?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory: {}", args.out.display()))?;
    let dest = args.out.join(&args.name);
    cache
        .write(&dest)
        .with_context(|| format!("writing manifest: {}", dest.display()))?;

    tracing::info!(entries = cache.len(), manifest = %dest.display(), "manifest written");
    println!("wrote {} entries to {}", cache.len(), dest.display());
    Ok(())
}
