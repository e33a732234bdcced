use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database file. `~` is expanded.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("~/.local/share/folio/folio.db")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScannerConfig {
    /// Post-processing workers per scan. Defaults to half the CPUs.
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Bound of the queue between the writer and the workers.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Where generated cover images are written.
    #[serde(default = "default_covers_dir")]
    pub covers_dir: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            channel_capacity: default_channel_capacity(),
            covers_dir: default_covers_dir(),
        }
    }
}

impl ScannerConfig {
    /// Effective worker count: the configured value, else half the CPUs,
    /// never less than one.
    pub fn workers(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get() / 2)
            .max(1)
    }
}

fn default_channel_capacity() -> usize {
    64
}

fn default_covers_dir() -> PathBuf {
    PathBuf::from("~/.local/share/folio/covers")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// Derive age ratings from genre and tag mappings as well.
    #[serde(default)]
    pub enable_extended_metadata: bool,

    /// Genres and tags that are never imported.
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// When non-empty, only these tags are imported.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Genre or tag title to age rating name, e.g. `"Ecchi" = "Mature 17+"`.
    #[serde(default)]
    pub age_rating_mappings: HashMap<String, String>,
}
