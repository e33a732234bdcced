//! Collaborators the scanner calls out to.
//!
//! The scanner owns reconciliation; everything that touches file contents
//! (page counting, hashing, embedded metadata, covers, word counts) or runs
//! after a series is committed goes through the traits defined here so tests
//! can swap in fakes.

pub mod archive;
pub mod covers;
pub mod settings;
pub mod word_count;

use std::path::Path;

use async_trait::async_trait;
use folio_common::{LibraryId, MangaFormat, Result, SeriesId};

pub use archive::FsArchiveService;
pub use covers::ArchiveCoverGenerator;
pub use settings::{MetadataSettings, SettingsProvider, StaticSettings};
pub use word_count::EpubWordCounter;

// ---------------------------------------------------------------------------
// File contents
// ---------------------------------------------------------------------------

/// Reads the contents of library files.
///
/// Methods are blocking; the scanner calls them from blocking contexts.
pub trait ArchiveService: Send + Sync {
    /// Number of readable pages in the file.
    fn count_pages(&self, path: &Path, format: MangaFormat) -> Result<i64>;

    /// Hex encoded digest of the file's bytes.
    fn hash_contents(&self, path: &Path) -> Result<String>;

    /// Raw `ComicInfo.xml` bytes embedded in the file, if any.
    fn read_embedded_metadata(&self, path: &Path, format: MangaFormat) -> Result<Option<Vec<u8>>>;
}

// ---------------------------------------------------------------------------
// Post-commit work
// ---------------------------------------------------------------------------

/// Produces cover images for a series from its files.
pub trait CoverGenerator: Send + Sync {
    fn generate_covers(&self, library_id: LibraryId, series_id: SeriesId, force: bool) -> Result<()>;
}

/// Computes word counts for text-based chapters.
pub trait WordCounter: Send + Sync {
    fn analyze_word_count(&self, library_id: LibraryId, series_id: SeriesId, force: bool) -> Result<()>;
}

/// Hook invoked once for every newly created series, e.g. to pull
/// metadata from an external source. Failures are logged, never fatal.
#[async_trait]
pub trait MetadataPrefetcher: Send + Sync {
    async fn prefetch(&self, library_id: LibraryId, series_id: SeriesId) -> Result<()>;
}
