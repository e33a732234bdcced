//! Reconciliation of one series' scanned files into the catalog.
//!
//! [`SeriesReconciler::process_series`] resolves (or creates) the series,
//! diffs its volume/chapter/file tree, refreshes chapter metadata, folds it
//! up to the series and commits, all inside one transaction. A failure
//! rolls back that series only.

pub mod folders;
pub mod metadata;
pub mod status;
pub mod volumes;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use folio_common::events::{EventBus, EventPayload};
use folio_common::{Error, LibraryId, Result, SeriesId};
use folio_db::models::{Library, Series, SeriesMetadata};
use folio_db::pool::write_transaction;
use folio_db::queries::{chapters, files, metadata as series_meta, recommendations, series as series_q, volumes as volume_q};
use folio_parser::normalize::{normalize, strip_sort_prefix};
use folio_parser::ParserInfo;
use rusqlite::Connection;

use self::metadata::{aggregate_series, refresh_chapter, MetadataContext};
use self::volumes::reconcile_volumes;
use super::directory::ScannedSeries;
use super::locks::{apply_unlocked, SeriesNames, SERIES_NAME_FIELDS};
use super::lookup::{PersonCache, TagUniverse};
use crate::services::{ArchiveService, MetadataSettings};

/// A committed series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledSeries {
    pub series_id: SeriesId,
    pub library_id: LibraryId,
    pub name: String,
    /// The series did not exist before this scan.
    pub created: bool,
    /// Any row of the series was written.
    pub changed: bool,
}

/// Reconciles series of one library during one scan.
pub struct SeriesReconciler<'a> {
    library: &'a Library,
    settings: &'a MetadataSettings,
    archive: &'a dyn ArchiveService,
    universe: &'a TagUniverse,
    events: &'a EventBus,
}

impl<'a> SeriesReconciler<'a> {
    pub fn new(
        library: &'a Library,
        settings: &'a MetadataSettings,
        archive: &'a dyn ArchiveService,
        universe: &'a TagUniverse,
        events: &'a EventBus,
    ) -> Self {
        Self {
            library,
            settings,
            archive,
            universe,
            events,
        }
    }

    /// Reconcile one series and commit it.
    ///
    /// Returns `None` when there is nothing to do (no files) or when the
    /// series failed; failures are logged and announced as `ScanError`.
    pub fn process_series(
        &self,
        conn: &mut Connection,
        scanned: &ScannedSeries,
        people: &mut PersonCache,
        force: bool,
    ) -> Option<ReconciledSeries> {
        if scanned.infos.is_empty() {
            return None;
        }

        if let Err(e) = people.preload(conn, &scanned.infos) {
            self.report_failure(scanned, &e);
            return None;
        }

        let tx = match write_transaction(conn) {
            Ok(tx) => tx,
            Err(e) => {
                self.report_failure(scanned, &e);
                return None;
            }
        };

        let outcome = match self.reconcile(&tx, scanned, people, force) {
            Ok(outcome) => outcome,
            Err(e) => {
                // dropping the transaction rolls it back
                drop(tx);
                self.report_failure(scanned, &e);
                return None;
            }
        };

        if let Err(e) = tx.commit() {
            self.report_failure(scanned, &Error::database(e.to_string()));
            return None;
        }

        if outcome.created {
            tracing::info!(series = %outcome.name, library = %self.library.name, "Added series");
            self.events.broadcast(EventPayload::SeriesAdded {
                series_id: outcome.series_id,
                name: outcome.name.clone(),
                library_id: self.library.id,
            });
        } else {
            self.relink_recommendations(conn, outcome.series_id);
        }

        Some(outcome)
    }

    fn report_failure(&self, scanned: &ScannedSeries, error: &Error) {
        let title = match error {
            Error::Conflict(_) => format!("Duplicate series detected for {}", scanned.key.name),
            _ => format!("Error processing {}", scanned.key.name),
        };
        tracing::error!(
            series = %scanned.key.name,
            library = %self.library.name,
            error = %error,
            "Failed to reconcile series, skipping it"
        );
        self.events.broadcast(EventPayload::ScanError {
            title,
            detail: error.to_string(),
        });
    }

    fn relink_recommendations(&self, conn: &Connection, series_id: SeriesId) {
        let series = match series_q::get_series(conn, series_id) {
            Ok(Some(series)) => series,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(series_id = %series_id, error = %e, "Failed to load series for recommendations");
                return;
            }
        };
        let mut names = vec![series.normalized_name.as_str()];
        if !series.normalized_localized_name.is_empty() {
            names.push(series.normalized_localized_name.as_str());
        }
        match recommendations::link_pending(conn, series_id, &names) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(series = %series.name, linked = n, "Linked external recommendations"),
            Err(e) => tracing::warn!(series = %series.name, error = %e, "Failed to link recommendations"),
        }
    }

    fn new_series(&self, first: &ParserInfo, scanned: &ScannedSeries) -> Series {
        let name = if first.series.trim().is_empty() {
            scanned.key.name.clone()
        } else {
            first.series.trim().to_string()
        };
        let sort_name = if !first.series_sort.trim().is_empty() {
            first.series_sort.trim().to_string()
        } else if self.library.remove_prefix_for_sort_name {
            strip_sort_prefix(&name)
        } else {
            name.clone()
        };
        let localized_name = first.localized_series.trim().to_string();
        Series {
            id: SeriesId::new(),
            library_id: self.library.id,
            normalized_name: scanned.key.normalized_name.clone(),
            normalized_localized_name: normalize(&localized_name),
            localized_name,
            sort_name,
            sort_name_locked: false,
            localized_name_locked: false,
            original_name: name.clone(),
            name,
            format: scanned.key.format,
            folder_path: None,
            lowest_folder_path: None,
            pages: 0,
            cover_image: None,
            last_folder_scanned: None,
            last_chapter_added: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn reconcile(
        &self,
        conn: &Connection,
        scanned: &ScannedSeries,
        people: &PersonCache,
        force: bool,
    ) -> Result<ReconciledSeries> {
        let infos = &scanned.infos;
        let first = infos
            .iter()
            .find(|i| i.comic_info.is_some())
            .or_else(|| infos.first())
            .ok_or_else(|| Error::internal("no files to reconcile"))?;

        // 1. identity
        let normalized_localized = normalize(&first.localized_series);
        let existing = series_q::find_by_any_name(
            conn,
            self.library.id,
            scanned.key.format,
            &scanned.key.normalized_name,
            &normalized_localized,
        )?;

        // 2. create if absent
        let (mut series, mut metadata, created) = match existing {
            Some(series) => {
                let metadata = series_meta::get_metadata(conn, series.id)?
                    .unwrap_or_else(|| SeriesMetadata::new(series.id));
                (series, metadata, false)
            }
            None => {
                let series = self.new_series(first, scanned);
                series_q::insert_series(conn, &series)?;
                let metadata = SeriesMetadata::new(series.id);
                series_meta::upsert_metadata(conn, &metadata)?;
                (series, metadata, true)
            }
        };
        let series_before = series.clone();
        let metadata_before = metadata.clone();

        let localized = first.localized_series.trim();
        let names = SeriesNames {
            sort_name: Some(first.series_sort.trim().to_string()).filter(|s| !s.is_empty()),
            localized_name: (!localized.is_empty() && normalized_localized != series.normalized_name)
                .then(|| (localized.to_string(), normalized_localized.clone())),
        };
        apply_unlocked(SERIES_NAME_FIELDS, &mut series, &names);

        // 3-4. volumes, chapters, files
        let pass = reconcile_volumes(conn, &series, infos, self.archive, force)?;

        let ctx = MetadataContext {
            settings: self.settings,
            universe: self.universe,
            people,
        };
        let mut refreshed = HashSet::new();
        let mut chapters_written = false;
        for (chapter_id, idx) in &pass.chapter_infos {
            if !pass.refresh.contains(chapter_id) || !refreshed.insert(*chapter_id) {
                continue;
            }
            let Some(mut chapter) = chapters::get_chapter(conn, *chapter_id)? else {
                continue;
            };
            chapters_written |= refresh_chapter(conn, &mut chapter, &infos[*idx], &ctx)?;
        }

        let links_changed = aggregate_series(
            conn,
            &series,
            &mut metadata,
            &pass.chapter_infos,
            infos,
            self.settings,
        )?;

        // folders
        let all_files = files::list_files_for_series(conn, series.id)?;
        let paths: Vec<&str> = all_files.iter().map(|f| f.file_path.as_str()).collect();
        series.folder_path = folders::series_folder_path(self.library, &series.name, &paths);
        series.lowest_folder_path = folders::lowest_folder_path(&paths);

        series.pages = volume_q::list_volumes(conn, series.id)?
            .iter()
            .map(|v| v.pages)
            .sum();

        let now = Utc::now();
        if pass.chapters_added > 0 {
            series.last_chapter_added = Some(now.to_rfc3339());
        }

        let changed = created
            || pass.dirty
            || chapters_written
            || links_changed
            || series != series_before
            || metadata != metadata_before;
        if needs_scan_stamp(changed, series.last_folder_scanned.as_deref(), scanned.latest_folder_change) {
            series.last_folder_scanned = Some(now.to_rfc3339());
        }

        if series != series_before {
            series_q::update_series(conn, &series)?;
        }
        if metadata != metadata_before {
            series_meta::upsert_metadata(conn, &metadata)?;
        }

        tracing::debug!(
            series = %series.name,
            created,
            changed,
            chapters_added = pass.chapters_added,
            chapters_removed = pass.chapters_removed,
            volumes_removed = pass.volumes_removed,
            "Reconciled series"
        );

        Ok(ReconciledSeries {
            series_id: series.id,
            library_id: self.library.id,
            name: series.name,
            created,
            changed,
        })
    }
}

/// Whether `last_folder_scanned` must move forward: the series changed,
/// was never stamped, or its folders changed in or after the stamp's
/// second. Folder change detection skips only folders strictly older than
/// the stamp, so an equal second must be re-stamped to become skippable.
fn needs_scan_stamp(changed: bool, last_scanned: Option<&str>, latest_folder_change: Option<DateTime<Utc>>) -> bool {
    if changed {
        return true;
    }
    let Some(last) = last_scanned.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) else {
        return true;
    };
    latest_folder_change.is_some_and(|folder| last.timestamp() <= folder.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_stamp_rules() {
        let stamp = "2024-01-01T00:00:10+00:00";
        let at = |secs: i64| DateTime::<Utc>::from_timestamp(secs, 0);
        let base = DateTime::parse_from_rfc3339(stamp).unwrap().timestamp();

        assert!(needs_scan_stamp(true, Some(stamp), None));
        assert!(needs_scan_stamp(false, None, None));
        assert!(needs_scan_stamp(false, Some(stamp), at(base)));
        assert!(!needs_scan_stamp(false, Some(stamp), at(base - 1)));
        assert!(!needs_scan_stamp(false, Some(stamp), at(base - 5)));
        assert!(needs_scan_stamp(false, Some(stamp), at(base + 1)));
    }
}
