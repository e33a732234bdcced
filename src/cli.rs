use clap::{Parser, Subcommand};
use folio_common::{LibraryType, MangaFormat, SeriesId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Comic and manga library scanner")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage libraries
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },

    /// Scan a library and reconcile its series
    Scan {
        /// Library name or id
        library: String,

        /// Reparse every folder, even unchanged ones
        #[arg(long)]
        force: bool,

        /// Print the scan summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rescan a single series
    ScanSeries {
        /// Series id
        series: SeriesId,

        /// Re-measure and refresh every file of the series
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// Register a new library
    Add {
        /// Display name
        name: String,

        /// Root folders of the library
        #[arg(required = true)]
        folders: Vec<PathBuf>,

        /// Library type (manga, comic, book, lightnovel, image)
        #[arg(long = "type", default_value = "manga")]
        library_type: LibraryType,

        /// Accepted file formats (repeatable); all when omitted
        #[arg(long = "format")]
        formats: Vec<MangaFormat>,
    },

    /// List libraries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
