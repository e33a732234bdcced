//! Genre rows, deduplicated globally by normalized title.

use folio_common::{Error, GenreId, Result};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::Genre;

/// List every genre.
pub fn list_genres(conn: &Connection) -> Result<Vec<Genre>> {
    let mut stmt = conn
        .prepare("SELECT id, title, normalized_title FROM genres ORDER BY normalized_title")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Genre::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Ensure a genre exists for every `(title, normalized_title)` pair and
/// return the rows for all of them, existing or new.
pub fn create_missing(conn: &Connection, titles: &[(String, String)]) -> Result<Vec<Genre>> {
    let mut insert = conn
        .prepare_cached(
            "INSERT INTO genres (id, title, normalized_title) VALUES (?1, ?2, ?3)
             ON CONFLICT(normalized_title) DO NOTHING",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let mut select = conn
        .prepare_cached("SELECT id, title, normalized_title FROM genres WHERE normalized_title = ?1")
        .map_err(|e| Error::database(e.to_string()))?;

    let mut out = Vec::with_capacity(titles.len());
    for (title, normalized) in titles {
        if normalized.is_empty() {
            continue;
        }
        insert
            .execute(rusqlite::params![GenreId::new().to_string(), title, normalized])
            .map_err(|e| Error::database(e.to_string()))?;
        let genre = select
            .query_row([normalized], Genre::from_row)
            .map_err(|e| Error::database(e.to_string()))?;
        out.push(genre);
    }
    Ok(out)
}

/// Delete genres no series or chapter references. Returns the number removed.
pub fn delete_orphans(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM genres
         WHERE id NOT IN (SELECT genre_id FROM series_genres)
           AND id NOT IN (SELECT genre_id FROM chapter_genres)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}
