//! Series metadata and its people / genre / tag associations.

use folio_common::{Error, GenreId, PersonId, PersonRole, Result, SeriesId, TagId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::{parse_id, to_json_list, PersonLink, SeriesMetadata};

const COLS: &str = "series_id, summary, summary_locked, age_rating, age_rating_locked,
    publication_status, publication_status_locked, language, language_locked,
    release_year, release_year_locked, web_links, web_links_locked, total_count,
    max_count, genres_locked, tags_locked, locked_roles";

/// Get the metadata row of a series.
pub fn get_metadata(conn: &Connection, series_id: SeriesId) -> Result<Option<SeriesMetadata>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM series_metadata WHERE series_id = ?1"),
        [series_id.to_string()],
        SeriesMetadata::from_row,
    );
    match result {
        Ok(m) => Ok(Some(m)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Insert or replace the metadata row of a series.
pub fn upsert_metadata(conn: &Connection, metadata: &SeriesMetadata) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO series_metadata ({COLS})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
             ON CONFLICT(series_id) DO UPDATE SET
                summary = excluded.summary,
                summary_locked = excluded.summary_locked,
                age_rating = excluded.age_rating,
                age_rating_locked = excluded.age_rating_locked,
                publication_status = excluded.publication_status,
                publication_status_locked = excluded.publication_status_locked,
                language = excluded.language,
                language_locked = excluded.language_locked,
                release_year = excluded.release_year,
                release_year_locked = excluded.release_year_locked,
                web_links = excluded.web_links,
                web_links_locked = excluded.web_links_locked,
                total_count = excluded.total_count,
                max_count = excluded.max_count,
                genres_locked = excluded.genres_locked,
                tags_locked = excluded.tags_locked,
                locked_roles = excluded.locked_roles"
        ),
        rusqlite::params![
            metadata.series_id.to_string(),
            metadata.summary,
            metadata.summary_locked,
            metadata.age_rating.as_str(),
            metadata.age_rating_locked,
            metadata.publication_status.as_str(),
            metadata.publication_status_locked,
            metadata.language,
            metadata.language_locked,
            metadata.release_year,
            metadata.release_year_locked,
            metadata.web_links,
            metadata.web_links_locked,
            metadata.total_count,
            metadata.max_count,
            metadata.genres_locked,
            metadata.tags_locked,
            to_json_list(&metadata.locked_roles)?,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// List the people attached to a series.
pub fn list_series_people(conn: &Connection, series_id: SeriesId) -> Result<Vec<PersonLink>> {
    let mut stmt = conn
        .prepare(
            "SELECT person_id, role, kavita_plus_connection FROM series_people
             WHERE series_id = ?1 ORDER BY role, person_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], PersonLink::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Attach a person to a series in a role; a no-op if already attached.
pub fn add_series_person(conn: &Connection, series_id: SeriesId, link: &PersonLink) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO series_people (series_id, person_id, role, kavita_plus_connection)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            series_id.to_string(),
            link.person_id.to_string(),
            link.role.as_str(),
            link.kavita_plus_connection,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Detach a person from one role on a series.
pub fn remove_series_person(
    conn: &Connection,
    series_id: SeriesId,
    person_id: PersonId,
    role: PersonRole,
) -> Result<()> {
    conn.execute(
        "DELETE FROM series_people WHERE series_id = ?1 AND person_id = ?2 AND role = ?3",
        rusqlite::params![series_id.to_string(), person_id.to_string(), role.as_str()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Genres and tags
// ---------------------------------------------------------------------------

/// Ids of the genres attached to a series.
pub fn list_series_genres(conn: &Connection, series_id: SeriesId) -> Result<Vec<GenreId>> {
    let mut stmt = conn
        .prepare("SELECT genre_id FROM series_genres WHERE series_id = ?1 ORDER BY genre_id")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], |row| parse_id(row, 0))
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn add_series_genre(conn: &Connection, series_id: SeriesId, genre_id: GenreId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO series_genres (series_id, genre_id) VALUES (?1, ?2)",
        rusqlite::params![series_id.to_string(), genre_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn remove_series_genre(conn: &Connection, series_id: SeriesId, genre_id: GenreId) -> Result<()> {
    conn.execute(
        "DELETE FROM series_genres WHERE series_id = ?1 AND genre_id = ?2",
        rusqlite::params![series_id.to_string(), genre_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Ids of the tags attached to a series.
pub fn list_series_tags(conn: &Connection, series_id: SeriesId) -> Result<Vec<TagId>> {
    let mut stmt = conn
        .prepare("SELECT tag_id FROM series_tags WHERE series_id = ?1 ORDER BY tag_id")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], |row| parse_id(row, 0))
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn add_series_tag(conn: &Connection, series_id: SeriesId, tag_id: TagId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO series_tags (series_id, tag_id) VALUES (?1, ?2)",
        rusqlite::params![series_id.to_string(), tag_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn remove_series_tag(conn: &Connection, series_id: SeriesId, tag_id: TagId) -> Result<()> {
    conn.execute(
        "DELETE FROM series_tags WHERE series_id = ?1 AND tag_id = ?2",
        rusqlite::params![series_id.to_string(), tag_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::{genres, people, test_support};
    use folio_common::{AgeRating, PublicationStatus};

    #[test]
    fn metadata_upsert_roundtrip() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");

        assert!(get_metadata(&conn, series.id).unwrap().is_none());

        let mut meta = SeriesMetadata::new(series.id);
        meta.age_rating = AgeRating::Mature;
        meta.publication_status = PublicationStatus::Ended;
        meta.locked_roles = vec![PersonRole::Writer];
        upsert_metadata(&conn, &meta).unwrap();
        assert_eq!(get_metadata(&conn, series.id).unwrap().unwrap(), meta);

        meta.summary = "Guts".into();
        meta.summary_locked = true;
        upsert_metadata(&conn, &meta).unwrap();
        let stored = get_metadata(&conn, series.id).unwrap().unwrap();
        assert_eq!(stored.summary, "Guts");
        assert!(stored.summary_locked);
        assert!(stored.is_role_locked(PersonRole::Writer));
    }

    #[test]
    fn people_links_are_unique_per_role() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let created = people::create_people(&conn, &[("Kentaro Miura".into(), "kentaromiura".into())]).unwrap();
        let person = &created[0];

        let writer = PersonLink {
            person_id: person.id,
            role: PersonRole::Writer,
            kavita_plus_connection: false,
        };
        add_series_person(&conn, series.id, &writer).unwrap();
        add_series_person(&conn, series.id, &writer).unwrap();
        add_series_person(
            &conn,
            series.id,
            &PersonLink { role: PersonRole::Penciller, ..writer },
        )
        .unwrap();
        assert_eq!(list_series_people(&conn, series.id).unwrap().len(), 2);

        remove_series_person(&conn, series.id, person.id, PersonRole::Writer).unwrap();
        let left = list_series_people(&conn, series.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].role, PersonRole::Penciller);
    }

    #[test]
    fn genre_links() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let all = genres::create_missing(&conn, &[("Action".into(), "action".into())]).unwrap();
        let action = all[0].id;

        add_series_genre(&conn, series.id, action).unwrap();
        assert_eq!(list_series_genres(&conn, series.id).unwrap(), vec![action]);
        remove_series_genre(&conn, series.id, action).unwrap();
        assert!(list_series_genres(&conn, series.id).unwrap().is_empty());
    }
}
