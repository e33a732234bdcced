//! Library scanning pipeline.
//!
//! A scan walks the library roots, groups parsed files into series,
//! reconciles each changed series in its own transaction and finally
//! removes whatever vanished from disk:
//!
//! ```text
//! ScanningFiles -> ComputingGenreTagUniverse -> ReconcilingSeries -> RemovingOrphans -> Done
//! ```
//!
//! Reconciliation runs on a single blocking writer lane. Every committed
//! series is handed over a bounded channel to a pool of workers doing the
//! post-commit side work (covers, word counts, metadata prefetch).

pub mod cleanup;
pub mod directory;
pub mod locks;
pub mod lookup;
pub mod reconciler;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use folio_common::events::{EventBus, EventPayload};
use folio_common::{Error, LibraryId, Result, SeriesId};
use folio_db::models::Library;
use folio_db::pool::{get_conn, DbPool};
use folio_db::queries::{files, libraries, series as series_q};
use folio_parser::{DefaultParser, Parser};
use serde::Serialize;

use self::cleanup::SeenKey;
use self::directory::{DirectoryScanner, ScannedSeries};
use self::lookup::{PersonCache, TagUniverse};
use self::reconciler::{ReconciledSeries, SeriesReconciler};
use crate::services::{
    ArchiveCoverGenerator, ArchiveService, CoverGenerator, EpubWordCounter, FsArchiveService,
    MetadataPrefetcher, MetadataSettings, SettingsProvider, WordCounter,
};

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Tuning knobs for the reconcile fan-out.
#[derive(Debug, Clone, Copy)]
pub struct ScannerOptions {
    /// Side-work workers reading committed series.
    pub worker_count: usize,
    /// Capacity of the writer to worker channel.
    pub channel_capacity: usize,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            worker_count: (num_cpus::get() / 2).max(1),
            channel_capacity: 64,
        }
    }
}

/// Summary of one library scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    /// Series committed by the writer lane.
    pub series_processed: u64,
    pub added: u64,
    pub removed: u64,
    pub failed: u64,
    pub skipped_unchanged: u64,
}

/// Pipeline stage, announced through `ScanProgress` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    ScanningFiles,
    ComputingGenreTagUniverse,
    ReconcilingSeries,
    RemovingOrphans,
    Done,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanningFiles => "ScanningFiles",
            Self::ComputingGenreTagUniverse => "ComputingGenreTagUniverse",
            Self::ReconcilingSeries => "ReconcilingSeries",
            Self::RemovingOrphans => "RemovingOrphans",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a running scan holds a claim on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ScanTarget {
    Library(LibraryId),
    Series(SeriesId),
}

/// Releases a scan claim when dropped.
struct ScanClaim {
    active: Arc<DashMap<ScanTarget, ()>>,
    target: ScanTarget,
}

impl Drop for ScanClaim {
    fn drop(&mut self) {
        self.active.remove(&self.target);
    }
}

/// Tally kept by the writer lane.
#[derive(Debug, Default)]
struct WriterTally {
    processed: u64,
    added: u64,
    failed: u64,
}

// ---------------------------------------------------------------------------
// ScannerService
// ---------------------------------------------------------------------------

/// Entry point for library and series scans.
#[derive(Clone)]
pub struct ScannerService {
    pool: DbPool,
    events: Arc<EventBus>,
    parser: Arc<dyn Parser>,
    archive: Arc<dyn ArchiveService>,
    covers: Arc<dyn CoverGenerator>,
    word_counter: Arc<dyn WordCounter>,
    prefetcher: Option<Arc<dyn MetadataPrefetcher>>,
    settings: Arc<dyn SettingsProvider>,
    options: ScannerOptions,
    active_scans: Arc<DashMap<ScanTarget, ()>>,
}

impl ScannerService {
    /// Create a scanner with the default filesystem-backed collaborators.
    pub fn new(
        pool: DbPool,
        events: Arc<EventBus>,
        settings: Arc<dyn SettingsProvider>,
        covers_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            covers: Arc::new(ArchiveCoverGenerator::new(pool.clone(), covers_dir.as_ref())),
            word_counter: Arc::new(EpubWordCounter::new(pool.clone())),
            pool,
            events,
            parser: Arc::new(DefaultParser::new()),
            archive: Arc::new(FsArchiveService),
            prefetcher: None,
            settings,
            options: ScannerOptions::default(),
            active_scans: Arc::new(DashMap::new()),
        }
    }

    pub fn with_options(mut self, options: ScannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveService>) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_covers(mut self, covers: Arc<dyn CoverGenerator>) -> Self {
        self.covers = covers;
        self
    }

    pub fn with_word_counter(mut self, word_counter: Arc<dyn WordCounter>) -> Self {
        self.word_counter = word_counter;
        self
    }

    pub fn with_prefetcher(mut self, prefetcher: Arc<dyn MetadataPrefetcher>) -> Self {
        self.prefetcher = Some(prefetcher);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether a scan of `library_id` is running.
    pub fn is_scanning(&self, library_id: LibraryId) -> bool {
        self.active_scans.contains_key(&ScanTarget::Library(library_id))
    }

    fn claim(&self, target: ScanTarget) -> Result<ScanClaim> {
        use dashmap::mapref::entry::Entry;

        match self.active_scans.entry(target) {
            Entry::Occupied(_) => {
                tracing::warn!(scan = ?target, "Scan already in progress, rejecting");
                Err(Error::conflict(format!("A scan of {target:?} is already in progress")))
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(ScanClaim {
                    active: self.active_scans.clone(),
                    target,
                })
            }
        }
    }

    fn progress(&self, library: &Library, phase: ScanPhase, series_name: &str, percent: f32) {
        self.events.broadcast(EventPayload::ScanProgress {
            library_name: library.name.clone(),
            series_name: series_name.to_string(),
            percent,
            phase: phase.to_string(),
        });
    }

    fn scan_error(&self, title: impl Into<String>, error: &Error) {
        self.events.broadcast(EventPayload::ScanError {
            title: title.into(),
            detail: error.to_string(),
        });
    }

    /// Every root must exist, and a root may only be empty when the library
    /// has no series yet (an unmounted share would otherwise wipe it).
    fn preflight(&self, library: &Library) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        let existing = series_q::count_series_for_library(&conn, library.id)?;

        for folder in &library.folders {
            let path = Path::new(folder);
            if !path.is_dir() {
                return Err(Error::not_found(format!(
                    "Library root {} of {} does not exist",
                    folder, library.name
                )));
            }
            let is_empty = std::fs::read_dir(path)?.next().is_none();
            if is_empty && existing > 0 {
                return Err(Error::invalid_input(format!(
                    "Library root {} of {} is empty but the library has {} series",
                    folder, library.name, existing
                )));
            }
        }
        Ok(())
    }

    /// Scan every root of a library and reconcile what changed.
    pub async fn scan_library(&self, library_id: LibraryId, force: bool) -> Result<ScanOutcome> {
        let _claim = self.claim(ScanTarget::Library(library_id))?;

        let library = {
            let conn = get_conn(&self.pool)?;
            libraries::get_library(&conn, library_id)?
                .ok_or_else(|| Error::not_found(format!("Library {library_id}")))?
        };
        let settings = self.settings.metadata_settings();

        tracing::info!(
            library_id = %library.id,
            library = %library.name,
            folders = ?library.folders,
            force,
            "Starting library scan"
        );
        self.events.broadcast(EventPayload::ScanStarted {
            library_id: library.id,
            library_name: library.name.clone(),
        });

        if let Err(e) = self.preflight(&library) {
            tracing::error!(library = %library.name, error = %e, "Library scan aborted before any change");
            self.scan_error(format!("Scan of {} aborted", library.name), &e);
            return Err(e);
        }

        // --- ScanningFiles ---
        self.progress(&library, ScanPhase::ScanningFiles, "", 0.0);
        let scanned = {
            let pool = self.pool.clone();
            let parser = self.parser.clone();
            let archive = self.archive.clone();
            let library = library.clone();
            tokio::task::spawn_blocking(move || {
                let conn = get_conn(&pool)?;
                let existing = series_q::list_series_for_library(&conn, library.id)?;
                drop(conn);
                Ok::<_, Error>(DirectoryScanner::new(&*parser, &*archive).scan(&library, &existing, force))
            })
            .await
            .map_err(|e| Error::internal(format!("Directory scan task failed: {e}")))??
        };

        let skipped_unchanged = scanned.iter().filter(|s| !s.has_changed).count() as u64;
        let seen: HashSet<SeenKey> = scanned
            .iter()
            .map(|s| (s.key.normalized_name.clone(), s.key.format))
            .collect();
        let changed: Vec<ScannedSeries> = scanned
            .into_iter()
            .filter(|s| s.has_changed && !s.infos.is_empty())
            .collect();
        tracing::debug!(
            library = %library.name,
            changed = changed.len(),
            unchanged = skipped_unchanged,
            "Directory scan finished"
        );

        // --- ComputingGenreTagUniverse ---
        self.progress(&library, ScanPhase::ComputingGenreTagUniverse, "", 0.0);
        let changed = Arc::new(changed);
        let universe = {
            let pool = self.pool.clone();
            let changed = changed.clone();
            let settings = settings.clone();
            tokio::task::spawn_blocking(move || {
                let mut conn = get_conn(&pool)?;
                TagUniverse::build(&mut conn, changed.iter().flat_map(|s| s.infos.iter()), &settings)
            })
            .await
            .map_err(|e| Error::internal(format!("Tag universe task failed: {e}")))??
        };
        tracing::debug!(library = %library.name, entries = universe.len(), "Genre/tag universe ready");

        // --- ReconcilingSeries ---
        let tally = self
            .reconcile_all(&library, changed, universe, settings, force)
            .await?;

        // --- RemovingOrphans ---
        self.progress(&library, ScanPhase::RemovingOrphans, "", 100.0);
        let removed = {
            let pool = self.pool.clone();
            let events = self.events.clone();
            let library = library.clone();
            tokio::task::spawn_blocking(move || {
                let conn = get_conn(&pool)?;
                let removed = match cleanup::remove_missing_series(&conn, &library, &seen, &events) {
                    Ok(removed) => removed.len() as u64,
                    Err(e) => {
                        tracing::error!(library = %library.name, error = %e, "Failed to remove missing series");
                        0
                    }
                };
                let orphans = cleanup::remove_orphans(&conn);
                tracing::debug!(library = %library.name, ?orphans, "Orphan cleanup finished");
                libraries::set_last_scanned(&conn, library.id, &Utc::now().to_rfc3339())?;
                Ok::<_, Error>(removed)
            })
            .await
            .map_err(|e| Error::internal(format!("Cleanup task failed: {e}")))??
        };

        // --- Done ---
        self.progress(&library, ScanPhase::Done, "", 100.0);
        let outcome = ScanOutcome {
            series_processed: tally.processed,
            added: tally.added,
            removed,
            failed: tally.failed,
            skipped_unchanged,
        };
        self.events.broadcast(EventPayload::ScanComplete {
            library_id: library.id,
            library_name: library.name.clone(),
            series_processed: outcome.series_processed,
            series_removed: outcome.removed,
            failed: outcome.failed,
        });
        tracing::info!(
            library = %library.name,
            processed = outcome.series_processed,
            added = outcome.added,
            removed = outcome.removed,
            failed = outcome.failed,
            skipped_unchanged = outcome.skipped_unchanged,
            "Library scan complete"
        );

        Ok(outcome)
    }

    /// Run the writer lane over `changed` and drain the side-work workers.
    async fn reconcile_all(
        &self,
        library: &Library,
        changed: Arc<Vec<ScannedSeries>>,
        universe: TagUniverse,
        settings: MetadataSettings,
        force: bool,
    ) -> Result<WriterTally> {
        let (tx, rx) = tokio::sync::mpsc::channel::<ReconciledSeries>(self.options.channel_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.options.worker_count);
        for _ in 0..self.options.worker_count.max(1) {
            let rx = rx.clone();
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let msg = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match msg {
                        Some(series) => this.side_work(&series, force).await,
                        None => break,
                    }
                }
            }));
        }

        let writer = {
            let pool = self.pool.clone();
            let events = self.events.clone();
            let archive = self.archive.clone();
            let library = library.clone();
            tokio::task::spawn_blocking(move || {
                let reconciler = SeriesReconciler::new(&library, &settings, &*archive, &universe, &events);
                let mut people = PersonCache::new();
                let mut tally = WriterTally::default();
                let total = changed.len().max(1) as f32;

                for (i, scanned) in changed.iter().enumerate() {
                    events.broadcast(EventPayload::ScanProgress {
                        library_name: library.name.clone(),
                        series_name: scanned.key.name.clone(),
                        percent: i as f32 * 100.0 / total,
                        phase: ScanPhase::ReconcilingSeries.to_string(),
                    });

                    let mut conn = match get_conn(&pool) {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(series = %scanned.key.name, error = %e, "No database connection for series");
                            tally.failed += 1;
                            continue;
                        }
                    };
                    match reconciler.process_series(&mut conn, scanned, &mut people, force) {
                        Some(done) => {
                            tally.processed += 1;
                            if done.created {
                                tally.added += 1;
                            }
                            if tx.blocking_send(done).is_err() {
                                tracing::warn!("Side-work workers stopped, skipping post-commit work");
                            }
                        }
                        None => tally.failed += 1,
                    }
                }
                tally
            })
        };

        let tally = writer
            .await
            .map_err(|e| Error::internal(format!("Writer lane failed: {e}")))?;

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Side-work worker panicked");
            }
        }
        Ok(tally)
    }

    /// Post-commit work for one series. Failures are logged only.
    async fn side_work(&self, series: &ReconciledSeries, force: bool) {
        let covers = self.covers.clone();
        let word_counter = self.word_counter.clone();
        let (library_id, series_id) = (series.library_id, series.series_id);

        let result = tokio::task::spawn_blocking(move || {
            if let Err(e) = covers.generate_covers(library_id, series_id, force) {
                tracing::warn!(series_id = %series_id, error = %e, "Cover generation failed");
            }
            if let Err(e) = word_counter.analyze_word_count(library_id, series_id, force) {
                tracing::warn!(series_id = %series_id, error = %e, "Word count failed");
            }
        })
        .await;
        if let Err(e) = result {
            tracing::warn!(series = %series.name, error = %e, "Side-work task panicked");
        }

        if series.created {
            if let Some(prefetcher) = &self.prefetcher {
                if let Err(e) = prefetcher.prefetch(library_id, series_id).await {
                    tracing::warn!(series = %series.name, error = %e, "Metadata prefetch failed");
                }
            }
        }
    }

    /// Rescan the folders of a single series.
    ///
    /// Returns `None` when the series no longer has any file on disk, in
    /// which case it is deleted.
    pub async fn scan_series(&self, series_id: SeriesId, force: bool) -> Result<Option<ReconciledSeries>> {
        let (series, library, known_files) = {
            let conn = get_conn(&self.pool)?;
            let series = series_q::get_series(&conn, series_id)?
                .ok_or_else(|| Error::not_found(format!("Series {series_id}")))?;
            let library = libraries::get_library(&conn, series.library_id)?
                .ok_or_else(|| Error::not_found(format!("Library {}", series.library_id)))?;
            let known_files: Vec<PathBuf> = files::list_files_for_series(&conn, series_id)?
                .into_iter()
                .map(|f| PathBuf::from(f.file_path))
                .collect();
            (series, library, known_files)
        };
        if self.is_scanning(library.id) {
            tracing::warn!(library = %library.name, "Library scan in progress, rejecting series scan");
            return Err(Error::conflict(format!("A scan of {} is already in progress", library.name)));
        }
        let _claim = self.claim(ScanTarget::Series(series_id))?;
        let settings = self.settings.metadata_settings();

        tracing::info!(series = %series.name, library = %library.name, force, "Starting series scan");

        let scanned = {
            let parser = self.parser.clone();
            let archive = self.archive.clone();
            let library = library.clone();
            let series = series.clone();
            tokio::task::spawn_blocking(move || {
                DirectoryScanner::new(&*parser, &*archive).scan_series(&library, &series, &known_files)
            })
            .await
            .map_err(|e| Error::internal(format!("Directory scan task failed: {e}")))?
        };

        let Some(scanned) = scanned.filter(|s| !s.infos.is_empty()) else {
            let pool = self.pool.clone();
            let events = self.events.clone();
            let library_id = library.id;
            let series = series.clone();
            tokio::task::spawn_blocking(move || {
                let conn = get_conn(&pool)?;
                if series_q::delete_series(&conn, series.id)? {
                    tracing::info!(series = %series.name, "Series has no files left, removed it");
                    events.broadcast(EventPayload::SeriesRemoved {
                        series_id: series.id,
                        name: series.name.clone(),
                        library_id,
                    });
                }
                cleanup::remove_orphans(&conn);
                Ok::<_, Error>(())
            })
            .await
            .map_err(|e| Error::internal(format!("Cleanup task failed: {e}")))??;
            return Ok(None);
        };

        let done = {
            let pool = self.pool.clone();
            let events = self.events.clone();
            let archive = self.archive.clone();
            tokio::task::spawn_blocking(move || {
                let mut conn = get_conn(&pool)?;
                let universe = TagUniverse::build(&mut conn, scanned.infos.iter(), &settings)?;
                let reconciler = SeriesReconciler::new(&library, &settings, &*archive, &universe, &events);
                let mut people = PersonCache::new();
                let done = reconciler.process_series(&mut conn, &scanned, &mut people, force);
                cleanup::remove_orphans(&conn);
                Ok::<_, Error>(done)
            })
            .await
            .map_err(|e| Error::internal(format!("Series reconcile task failed: {e}")))??
        };

        if let Some(done) = &done {
            self.side_work(done, force).await;
        }
        Ok(done)
    }
}
