//! Shared test harness for integration tests.
//!
//! Provides [`TestLibrary`]: a temporary library root on disk, a file-backed
//! database holding one library pointing at that root, and an [`EventBus`].
//! Files are real CBZ archives so the default archive service and parser
//! run unmodified.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use folio::scanner::{ScannerOptions, ScannerService};
use folio::services::{MetadataPrefetcher, MetadataSettings, StaticSettings};
use folio_common::events::{Event, EventBus};
use folio_common::{LibraryId, LibraryType, MangaFormat, Result, SeriesId};
use folio_db::models::{Chapter, Library, MangaFile, PersonLink, Series, SeriesMetadata, Volume};
use folio_db::pool::{get_conn, init_pool, DbPool, PooledConnection};
use folio_db::queries::{chapters, files, libraries, metadata, series as series_q, volumes};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// A library on disk plus the database it is cataloged in.
pub struct TestLibrary {
    pub dir: TempDir,
    pub root: PathBuf,
    pub pool: DbPool,
    pub library: Library,
    pub events: Arc<EventBus>,
}

impl TestLibrary {
    /// A manga library accepting archives, with an empty root.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir.path().join("library");
        std::fs::create_dir_all(&root).expect("failed to create library root");
        let pool = init_pool(&dir.path().join("folio.db")).expect("failed to open database");

        let library = {
            let conn = get_conn(&pool).unwrap();
            libraries::create_library(
                &conn,
                "Manga",
                LibraryType::Manga,
                &[root.to_string_lossy().into_owned()],
                &[MangaFormat::Archive, MangaFormat::Epub],
            )
            .unwrap()
        };

        Self {
            dir,
            root,
            pool,
            library,
            events: Arc::new(EventBus::new(1024)),
        }
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.pool).unwrap()
    }

    /// Scanner with default collaborators and two side-work workers.
    pub fn scanner(&self) -> ScannerService {
        self.scanner_with(MetadataSettings::default())
    }

    pub fn scanner_with(&self, settings: MetadataSettings) -> ScannerService {
        ScannerService::new(
            self.pool.clone(),
            self.events.clone(),
            Arc::new(StaticSettings(settings)),
            self.dir.path().join("covers"),
        )
        .with_options(ScannerOptions {
            worker_count: 2,
            channel_capacity: 4,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Write a CBZ with `pages` images and an optional `ComicInfo.xml` at
    /// `rel` below the library root.
    pub fn add_archive(&self, rel: &str, pages: usize, comic_info: Option<&str>) -> PathBuf {
        let path = self.root.join(rel);
        write_cbz(&path, pages, comic_info);
        path
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.root.join(rel)).expect("failed to remove file");
    }

    /// Move the mtime of every directory below the root a few minutes into
    /// the past, so the next scan stamps them as strictly older.
    pub fn backdate_folders(&self) {
        let past = SystemTime::now() - Duration::from_secs(300);
        for entry in walkdir::WalkDir::new(&self.root) {
            let entry = entry.unwrap();
            if entry.file_type().is_dir() {
                File::open(entry.path())
                    .and_then(|dir| dir.set_modified(past))
                    .expect("failed to backdate folder");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Catalog accessors
    // -----------------------------------------------------------------------

    pub fn series(&self) -> Vec<Series> {
        series_q::list_series_for_library(&self.conn(), self.library.id).unwrap()
    }

    pub fn series_named(&self, name: &str) -> Series {
        self.series()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no series named {name}"))
    }

    pub fn volumes(&self, series_id: SeriesId) -> Vec<Volume> {
        volumes::list_volumes(&self.conn(), series_id).unwrap()
    }

    pub fn chapters(&self, series_id: SeriesId) -> Vec<Chapter> {
        chapters::list_chapters_for_series(&self.conn(), series_id).unwrap()
    }

    pub fn files(&self, series_id: SeriesId) -> Vec<MangaFile> {
        files::list_files_for_series(&self.conn(), series_id).unwrap()
    }

    pub fn metadata(&self, series_id: SeriesId) -> SeriesMetadata {
        metadata::get_metadata(&self.conn(), series_id)
            .unwrap()
            .expect("series has no metadata row")
    }

    pub fn series_people(&self, series_id: SeriesId) -> Vec<PersonLink> {
        metadata::list_series_people(&self.conn(), series_id).unwrap()
    }

    /// Every catalog row of the library, for before/after comparisons.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for series in self.series() {
            let id = series.id;
            snapshot.metadata.push(self.metadata(id));
            snapshot.volumes.extend(self.volumes(id));
            snapshot.chapters.extend(self.chapters(id));
            snapshot.files.extend(self.files(id));
            let mut people = self.series_people(id);
            people.sort_by_key(|l| (l.person_id, l.role));
            snapshot.people.push((id, people));
            snapshot.series.push(series);
        }
        snapshot
    }
}

/// All rows below a library.
#[derive(Debug, Default, PartialEq)]
pub struct Snapshot {
    pub series: Vec<Series>,
    pub metadata: Vec<SeriesMetadata>,
    pub volumes: Vec<Volume>,
    pub chapters: Vec<Chapter>,
    pub files: Vec<MangaFile>,
    pub people: Vec<(SeriesId, Vec<PersonLink>)>,
}

/// Write a CBZ archive with `pages` tiny image entries.
pub fn write_cbz(path: &Path, pages: usize, comic_info: Option<&str>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for page in 1..=pages {
        zip.start_file(format!("{page:03}.jpg"), options).unwrap();
        zip.write_all(&[0xFF, 0xD8, 0xFF, page as u8]).unwrap();
    }
    if let Some(xml) = comic_info {
        zip.start_file("ComicInfo.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Build a `ComicInfo.xml` document from `(element, value)` pairs.
pub fn comic_info(fields: &[(&str, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<ComicInfo>\n");
    for (name, value) in fields {
        xml.push_str(&format!("  <{name}>{value}</{name}>\n"));
    }
    xml.push_str("</ComicInfo>\n");
    xml
}

/// Drain every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Prefetcher recording every series it was asked about.
#[derive(Default)]
pub struct RecordingPrefetcher {
    pub calls: Mutex<Vec<(LibraryId, SeriesId)>>,
}

impl RecordingPrefetcher {
    pub fn calls(&self) -> Vec<(LibraryId, SeriesId)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataPrefetcher for RecordingPrefetcher {
    async fn prefetch(&self, library_id: LibraryId, series_id: SeriesId) -> Result<()> {
        self.calls.lock().unwrap().push((library_id, series_id));
        Ok(())
    }
}
