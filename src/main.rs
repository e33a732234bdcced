mod cli;

use folio::{
    config,
    scanner::{ScannerOptions, ScannerService},
    services::{MetadataSettings, StaticSettings},
};
use folio_common::{events::EventBus, LibraryId, MangaFormat, SeriesId};
use folio_db::{
    models::Library,
    pool::{get_conn, init_pool, DbPool},
    queries::libraries,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, LibraryCommands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "folio=trace,folio_parser=debug,folio_db=debug,folio_common=debug".to_string()
        } else {
            "folio=info,folio_parser=info,folio_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Library { command } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let pool = open_database(&config)?;
            match command {
                LibraryCommands::Add {
                    name,
                    folders,
                    library_type,
                    formats,
                } => add_library(&pool, &name, library_type, &folders, &formats),
                LibraryCommands::List { json } => list_libraries(&pool, json),
            }
        }
        Commands::Scan {
            library,
            force,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan_library(cli.config.as_deref(), &library, force, json))
        }
        Commands::ScanSeries { series, force } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan_series(cli.config.as_deref(), series, force))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("folio {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_database(config: &config::Config) -> Result<DbPool> {
    tracing::debug!("Opening database at {:?}", config.database.path);
    init_pool(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))
}

fn build_scanner(config: &config::Config, pool: DbPool) -> Result<ScannerService> {
    let settings = MetadataSettings::from_config(&config.metadata)
        .context("Invalid [metadata] configuration")?;
    let events = Arc::new(EventBus::new(256));

    // Mirror scan events to the log so a CLI run shows progress.
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            tracing::debug!(event = ?event.payload, "Scan event");
        }
    });

    std::fs::create_dir_all(&config.scanner.covers_dir).with_context(|| {
        format!("Failed to create covers directory {:?}", config.scanner.covers_dir)
    })?;

    Ok(
        ScannerService::new(pool, events, Arc::new(StaticSettings(settings)), &config.scanner.covers_dir)
            .with_options(ScannerOptions {
                worker_count: config.scanner.workers(),
                channel_capacity: config.scanner.channel_capacity,
            }),
    )
}

fn resolve_library(pool: &DbPool, name_or_id: &str) -> Result<Library> {
    let conn = get_conn(pool)?;
    if let Ok(id) = name_or_id.parse::<LibraryId>() {
        if let Some(library) = libraries::get_library(&conn, id)? {
            return Ok(library);
        }
    }
    libraries::get_library_by_name(&conn, name_or_id)?
        .with_context(|| format!("No library named {name_or_id:?}"))
}

async fn scan_library(config_path: Option<&Path>, library: &str, force: bool, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_database(&config)?;
    let library = resolve_library(&pool, library)?;
    let scanner = build_scanner(&config, pool)?;

    let outcome = scanner
        .scan_library(library.id, force)
        .await
        .with_context(|| format!("Scan of {} failed", library.name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!("Scanned {}", library.name);
    println!("  Series processed: {}", outcome.series_processed);
    println!("  Added:            {}", outcome.added);
    println!("  Removed:          {}", outcome.removed);
    println!("  Unchanged:        {}", outcome.skipped_unchanged);
    println!("  Failed:           {}", outcome.failed);
    Ok(())
}

async fn scan_series(config_path: Option<&Path>, series_id: SeriesId, force: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_database(&config)?;
    let scanner = build_scanner(&config, pool)?;

    match scanner.scan_series(series_id, force).await? {
        Some(series) if series.changed => println!("Updated {}", series.name),
        Some(series) => println!("{} is up to date", series.name),
        None => println!("Series {series_id} has no files left and was removed"),
    }
    Ok(())
}

fn add_library(
    pool: &DbPool,
    name: &str,
    library_type: folio_common::LibraryType,
    folders: &[PathBuf],
    formats: &[MangaFormat],
) -> Result<()> {
    let folders = folders
        .iter()
        .map(|f| {
            std::fs::canonicalize(f)
                .with_context(|| format!("Library folder {:?} is not accessible", f))
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect::<Result<Vec<_>>>()?;
    let formats = if formats.is_empty() {
        vec![MangaFormat::Archive, MangaFormat::Epub, MangaFormat::Pdf, MangaFormat::Image]
    } else {
        formats.to_vec()
    };

    let conn = get_conn(pool)?;
    if libraries::get_library_by_name(&conn, name)?.is_some() {
        anyhow::bail!("A library named {name:?} already exists");
    }
    let library = libraries::create_library(&conn, name, library_type, &folders, &formats)?;
    println!("Created library {} ({})", library.name, library.id);
    Ok(())
}

fn list_libraries(pool: &DbPool, json: bool) -> Result<()> {
    let conn = get_conn(pool)?;
    let all = libraries::list_libraries(&conn)?;
    if json {
        let rows: Vec<serde_json::Value> = all
            .iter()
            .map(|l| {
                serde_json::json!({
                    "id": l.id,
                    "name": l.name,
                    "type": l.library_type,
                    "folders": l.folders,
                    "formats": l.file_types,
                    "last_scanned": l.last_scanned,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if all.is_empty() {
        println!("No libraries configured");
        return Ok(());
    }
    for library in all {
        println!("{}  {}  [{}]", library.id, library.name, library.library_type);
        for folder in &library.folders {
            println!("    {}", folder);
        }
        println!(
            "    last scanned: {}",
            library.last_scanned.as_deref().unwrap_or("never")
        );
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            MetadataSettings::from_config(&config.metadata)?;
            println!("✓ Configuration is valid");
            println!("  Database: {:?}", config.database.path);
            println!("  Workers: {}", config.scanner.workers());
            println!("  Channel capacity: {}", config.scanner.channel_capacity);
            println!("  Extended metadata: {}", config.metadata.enable_extended_metadata);
            println!("  Age rating mappings: {}", config.metadata.age_rating_mappings.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Database: {:?}", config.database.path);
            println!("  Workers: {}", config.scanner.workers());
        }
    }

    Ok(())
}
