//! Tag rows, deduplicated globally by normalized title.

use folio_common::{Error, Result, TagId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::Tag;

/// List every tag.
pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare("SELECT id, title, normalized_title FROM tags ORDER BY normalized_title")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Tag::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Ensure a tag exists for every `(title, normalized_title)` pair and
/// return the rows for all of them, existing or new.
pub fn create_missing(conn: &Connection, titles: &[(String, String)]) -> Result<Vec<Tag>> {
    let mut insert = conn
        .prepare_cached(
            "INSERT INTO tags (id, title, normalized_title) VALUES (?1, ?2, ?3)
             ON CONFLICT(normalized_title) DO NOTHING",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let mut select = conn
        .prepare_cached("SELECT id, title, normalized_title FROM tags WHERE normalized_title = ?1")
        .map_err(|e| Error::database(e.to_string()))?;

    let mut out = Vec::with_capacity(titles.len());
    for (title, normalized) in titles {
        if normalized.is_empty() {
            continue;
        }
        insert
            .execute(rusqlite::params![TagId::new().to_string(), title, normalized])
            .map_err(|e| Error::database(e.to_string()))?;
        let tag = select
            .query_row([normalized], Tag::from_row)
            .map_err(|e| Error::database(e.to_string()))?;
        out.push(tag);
    }
    Ok(out)
}

/// Delete tags no series or chapter references. Returns the number removed.
pub fn delete_orphans(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM tags
         WHERE id NOT IN (SELECT tag_id FROM series_tags)
           AND id NOT IN (SELECT tag_id FROM chapter_tags)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn create_missing_dedupes_by_normalized_title() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let first = create_missing(&conn, &[("Spoilers".into(), "spoilers".into())]).unwrap();
        let second = create_missing(
            &conn,
            &[("SPOILERS".into(), "spoilers".into()), ("Isekai".into(), "isekai".into())],
        )
        .unwrap();

        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].title, "Spoilers");
        assert_eq!(list_tags(&conn).unwrap().len(), 2);
    }

    #[test]
    fn orphans_are_removed() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_missing(&conn, &[("Oneshot".into(), "oneshot".into())]).unwrap();
        assert_eq!(delete_orphans(&conn).unwrap(), 1);
        assert!(list_tags(&conn).unwrap().is_empty());
    }
}
