//! Post-scan removal of vanished series and orphaned rows.

use std::collections::HashSet;

use folio_common::events::{EventBus, EventPayload};
use folio_common::{MangaFormat, Result};
use folio_db::models::{Library, Series};
use folio_db::queries::{chapters, genres, people, series as series_q, tags, volumes};
use rusqlite::Connection;

/// Identity of a scanned series within a library.
pub type SeenKey = (String, MangaFormat);

/// Whether `series` was seen under either of its names.
fn was_seen(series: &Series, seen: &HashSet<SeenKey>) -> bool {
    let by_name = (series.normalized_name.clone(), series.format);
    if seen.contains(&by_name) {
        return true;
    }
    !series.normalized_localized_name.is_empty()
        && seen.contains(&(series.normalized_localized_name.clone(), series.format))
}

/// Delete every series of `library` whose key is not in `seen`.
///
/// Returns the removed series. Each removal is announced on `events`.
pub fn remove_missing_series(
    conn: &Connection,
    library: &Library,
    seen: &HashSet<SeenKey>,
    events: &EventBus,
) -> Result<Vec<Series>> {
    let mut removed = Vec::new();
    for series in series_q::list_series_for_library(conn, library.id)? {
        if was_seen(&series, seen) {
            continue;
        }
        if series_q::delete_series(conn, series.id)? {
            tracing::info!(series = %series.name, library = %library.name, "Removed series no longer on disk");
            events.broadcast(EventPayload::SeriesRemoved {
                series_id: series.id,
                name: series.name.clone(),
                library_id: library.id,
            });
            removed.push(series);
        }
    }
    Ok(removed)
}

/// Rows deleted by [`remove_orphans`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrphanCounts {
    pub volumes: usize,
    pub chapters: usize,
    pub people: usize,
    pub genres: usize,
    pub tags: usize,
}

/// Delete volumes without chapters, chapters without files, and people,
/// genres and tags nothing links to. Each step runs even if an earlier one
/// failed.
pub fn remove_orphans(conn: &Connection) -> OrphanCounts {
    fn step(name: &str, result: Result<usize>) -> usize {
        match result {
            Ok(n) => {
                if n > 0 {
                    tracing::debug!(count = n, "Removed orphaned {}", name);
                }
                n
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to remove orphaned {}", name);
                0
            }
        }
    }

    // chapters first so that volumes they leave empty go in the same pass
    let chapters = step("chapters", chapters::delete_orphans(conn));
    let volumes = step("volumes", volumes::delete_orphans(conn));
    OrphanCounts {
        volumes,
        chapters,
        people: step("people", people::delete_orphans(conn)),
        genres: step("genres", genres::delete_orphans(conn)),
        tags: step("tags", tags::delete_orphans(conn)),
    }
}
