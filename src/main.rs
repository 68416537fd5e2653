//! # stocktag
//!
//! Inspect and maintain persisted batch progress, scan folders, export CSVs
//! and embed tags. Batches themselves are started by an application that
//! supplies a metadata generator; this binary works on what they leave behind.

use clap::{ArgAction, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stocktag_batch::{Persistence, ReadyFolder, Resume};
use stocktag_cache::{Database, SqliteStore};
use stocktag_config::{Config, StorageBackend};
use stocktag_embed::{EmbedRequest, ExifTool, TagEmbedder};
use stocktag_model::{Platform, Snapshot};
use stocktag_storage::StoreHandle;
use stocktag_storage::backend::{LocalStore, ReadOnlyStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stocktag", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON), merged over the user config.
    #[arg(short, long, env = "STOCKTAG_CONFIG")]
    config: Option<PathBuf>,

    /// More logging (repeat for more).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the persisted batch progress, if any.
    Status,
    /// List the media files each folder would contribute to a batch.
    Scan {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Write CSV exports from the persisted progress.
    Export {
        /// Platform layouts to write. Defaults to the configured platforms.
        #[arg(short, long, value_parser = parse_platform)]
        platform: Vec<Platform>,
        /// Output directory. Defaults to `export.root`.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Put failed images back to pending, so the next run retries them.
    ResetFailed,
    /// Embed tags into a media file with ExifTool.
    Embed {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated.
        #[arg(long)]
        keywords: Option<String>,
    },
    /// Show the tags already stored in a media file.
    Tags {
        file: PathBuf,
    },
    /// Discard the persisted progress.
    Clear,
}

fn parse_platform(s: &str) -> std::result::Result<Platform, String> {
    s.parse::<Platform>().map_err(|err| (*err).to_string())
}

/// Flatten a crate error tree into a diagnostic.
fn report(err: impl Debug) -> miette::Report {
    miette!("{err:?}")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn open_store(config: &Config, read_only: bool) -> Result<StoreHandle> {
    let path = config.storage.resolved_path().map_err(report)?;
    tracing::debug!(backend = ?config.storage.backend, path = %path.display(), "Opening progress store");
    let store: StoreHandle = match config.storage.backend {
        StorageBackend::Local => Arc::new(LocalStore::new("local", &path).map_err(report)?),
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).into_diagnostic()?;
            }
            let db = Database::connect(&path).await.map_err(report)?;
            Arc::new(SqliteStore::from(&db))
        },
    };
    Ok(match read_only {
        true => Arc::new(ReadOnlyStore::new(store)),
        false => store,
    })
}

async fn persistence(config: &Config, read_only: bool) -> Result<Persistence> {
    Ok(Persistence::new(open_store(config, read_only).await?))
}

fn print_snapshot(snapshot: &Snapshot, now: i64) {
    let age = snapshot.age(now);
    println!(
        "{} of {} images done ({} failed), folder {} of {}, saved {}h{:02}m ago",
        snapshot.completed_images + snapshot.failed_images,
        snapshot.total_images,
        snapshot.failed_images,
        (snapshot.current_folder_index + 1).min(snapshot.total_folders),
        snapshot.total_folders,
        age.whole_hours(),
        age.whole_minutes() % 60,
    );
    for folder in &snapshot.folders {
        println!(
            "  [{}] {} ({}/{} images)",
            folder.status,
            folder.folder_name,
            folder.current_image_index,
            folder.images.len()
        );
        if let Some(error) = &folder.error {
            println!("      error: {error}");
        }
    }
}

async fn status(config: &Config) -> Result<()> {
    let now = Snapshot::now_millis();
    match persistence(config, true).await?.resume(now).await.map_err(report)? {
        Resume::None => println!("No batch progress saved."),
        Resume::Fresh(snapshot) => {
            println!("Resumable batch:");
            print_snapshot(&snapshot, now);
        },
        Resume::Stale(snapshot) => {
            println!("Stale batch (too old to resume automatically):");
            print_snapshot(&snapshot, now);
        },
    }
    Ok(())
}

async fn scan(folders: &[PathBuf]) -> Result<()> {
    for folder in folders {
        let ready = ReadyFolder::from_scan(folder).await.map_err(report)?;
        println!("{}:", folder.display());
        for file in &ready.files {
            println!("  {}", file.file_name);
        }
        tracing::debug!(folder = %folder.display(), files = ready.files.len(), "Scan complete");
    }
    Ok(())
}

async fn export(config: &Config, platforms: Vec<Platform>, out: Option<PathBuf>) -> Result<()> {
    let root = out
        .or_else(|| config.export.root.clone())
        .ok_or_else(|| miette!("no output directory: pass --out or set export.root"))?;
    let platforms = match platforms.is_empty() {
        true => config.export.platforms.clone(),
        false => platforms,
    };
    let Some(snapshot) = persistence(config, true).await?.load().await.map_err(report)? else {
        println!("No batch progress saved; nothing to export.");
        return Ok(());
    };
    for folder in &snapshot.folders {
        for platform in &platforms {
            if let Some(path) = stocktag_export::export(folder, &config.export.categories, *platform, &root)
                .await
                .map_err(report)?
            {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

async fn reset_failed(config: &Config) -> Result<()> {
    let persistence = persistence(config, false).await?;
    let Some(mut snapshot) = persistence.load().await.map_err(report)? else {
        println!("No batch progress saved.");
        return Ok(());
    };
    let reset = snapshot.reset_failed();
    if reset > 0 {
        snapshot.saved_at = Snapshot::now_millis();
        persistence.save(&snapshot).await.map_err(report)?;
    }
    println!("{reset} failed image(s) reset to pending.");
    Ok(())
}

async fn embed(file: &Path, request: EmbedRequest) -> Result<()> {
    let exiftool = ExifTool::discover().map_err(report)?;
    let result = exiftool.embed(file, &request).await;
    match result.success {
        true => {
            println!("{}", result.message);
            Ok(())
        },
        false => Err(miette!("{}", result.message)),
    }
}

async fn tags(file: &Path) -> Result<()> {
    let exiftool = ExifTool::discover().map_err(report)?;
    let data = exiftool.read(file).await.map_err(report)?;
    println!("title:       {}", data.title.as_deref().unwrap_or_default());
    println!("description: {}", data.description.as_deref().unwrap_or_default());
    println!("keywords:    {}", data.keywords.as_deref().unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load(cli.config.as_deref()).map_err(report)?;

    match cli.command {
        Command::Status => status(&config).await,
        Command::Scan { folders } => scan(&folders).await,
        Command::Export { platform, out } => export(&config, platform, out).await,
        Command::ResetFailed => reset_failed(&config).await,
        Command::Embed { file, title, description, keywords } => {
            embed(&file, EmbedRequest { title, description, keywords }).await
        },
        Command::Tags { file } => tags(&file).await,
        Command::Clear => {
            persistence(&config, false).await?.clear().await.map_err(report)?;
            println!("Batch progress cleared.");
            Ok(())
        },
    }
}
