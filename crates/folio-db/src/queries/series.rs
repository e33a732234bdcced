//! Series CRUD and identity lookups.

use folio_common::{Error, LibraryId, MangaFormat, Result, SeriesId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::Series;

const COLS: &str = "id, library_id, name, normalized_name, localized_name,
    normalized_localized_name, sort_name, sort_name_locked, localized_name_locked,
    original_name, format, folder_path, lowest_folder_path, pages, cover_image,
    last_folder_scanned, last_chapter_added, created_at";

/// Insert a new series row.
pub fn insert_series(conn: &Connection, series: &Series) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO series ({COLS})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)"
        ),
        rusqlite::params![
            series.id.to_string(),
            series.library_id.to_string(),
            series.name,
            series.normalized_name,
            series.localized_name,
            series.normalized_localized_name,
            series.sort_name,
            series.sort_name_locked,
            series.localized_name_locked,
            series.original_name,
            series.format.as_str(),
            series.folder_path,
            series.lowest_folder_path,
            series.pages,
            series.cover_image,
            series.last_folder_scanned,
            series.last_chapter_added,
            series.created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Persist every mutable column of `series`.
pub fn update_series(conn: &Connection, series: &Series) -> Result<()> {
    conn.execute(
        "UPDATE series SET name = ?1, normalized_name = ?2, localized_name = ?3,
            normalized_localized_name = ?4, sort_name = ?5, sort_name_locked = ?6,
            localized_name_locked = ?7, original_name = ?8, format = ?9, folder_path = ?10,
            lowest_folder_path = ?11, pages = ?12, cover_image = ?13,
            last_folder_scanned = ?14, last_chapter_added = ?15
         WHERE id = ?16",
        rusqlite::params![
            series.name,
            series.normalized_name,
            series.localized_name,
            series.normalized_localized_name,
            series.sort_name,
            series.sort_name_locked,
            series.localized_name_locked,
            series.original_name,
            series.format.as_str(),
            series.folder_path,
            series.lowest_folder_path,
            series.pages,
            series.cover_image,
            series.last_folder_scanned,
            series.last_chapter_added,
            series.id.to_string(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Get a series by ID.
pub fn get_series(conn: &Connection, id: SeriesId) -> Result<Option<Series>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM series WHERE id = ?1"),
        [id.to_string()],
        Series::from_row,
    );
    match result {
        Ok(s) => Ok(Some(s)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List every series in a library, ordered by sort name.
pub fn list_series_for_library(conn: &Connection, library_id: LibraryId) -> Result<Vec<Series>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM series WHERE library_id = ?1 ORDER BY sort_name"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([library_id.to_string()], Series::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Count the series in a library.
pub fn count_series_for_library(conn: &Connection, library_id: LibraryId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM series WHERE library_id = ?1",
        [library_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Find the series a scanned batch belongs to.
///
/// A series matches when its normalized name or normalized localized name
/// equals either of the scanned names, within the same library and format.
/// Empty names never match. More than one match is reported as
/// [`Error::Conflict`]: two folders produced the same identity and the
/// caller must not guess which one is meant.
pub fn find_by_any_name(
    conn: &Connection,
    library_id: LibraryId,
    format: MangaFormat,
    normalized_name: &str,
    normalized_localized_name: &str,
) -> Result<Option<Series>> {
    let localized = if normalized_localized_name.is_empty() {
        normalized_name
    } else {
        normalized_localized_name
    };

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM series
             WHERE library_id = ?1 AND format = ?2
               AND (normalized_name IN (?3, ?4)
                    OR (normalized_localized_name <> '' AND normalized_localized_name IN (?3, ?4)))"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                library_id.to_string(),
                format.as_str(),
                normalized_name,
                localized
            ],
            Series::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let mut matches = collect_rows(rows)?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        n => Err(Error::conflict(format!(
            "{n} series match '{normalized_name}' ({format}): {}",
            matches
                .iter()
                .map(|s| format!("{} [{}]", s.name, s.folder_path.as_deref().unwrap_or("?")))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Delete a series (cascades to metadata, volumes, chapters and files).
pub fn delete_series(conn: &Connection, id: SeriesId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM series WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Set the stored cover image path.
pub fn set_cover_image(conn: &Connection, id: SeriesId, cover: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE series SET cover_image = ?1 WHERE id = ?2",
        rusqlite::params![cover, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}
