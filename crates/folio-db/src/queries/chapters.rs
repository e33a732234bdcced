//! Chapter CRUD operations and chapter-level associations.

use folio_common::{ChapterId, Error, GenreId, PersonId, PersonRole, Result, SeriesId, TagId, VolumeId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::{parse_id, to_json_list, Chapter, PersonLink};

const COLS: &str = "c.id, c.volume_id, c.chapter_range, c.min_number, c.max_number, c.is_special,
    c.title, c.title_locked, c.summary, c.summary_locked, c.language, c.language_locked,
    c.age_rating, c.age_rating_locked, c.isbn, c.isbn_locked, c.sort_order,
    c.sort_order_locked, c.release_date, c.release_date_locked, c.pages, c.total_count,
    c.count, c.web_links, c.word_count, c.genres_locked, c.tags_locked, c.locked_roles,
    c.created_at";

/// List the chapters of a volume in reading order.
pub fn list_chapters(conn: &Connection, volume_id: VolumeId) -> Result<Vec<Chapter>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM chapters c WHERE c.volume_id = ?1
             ORDER BY c.sort_order, c.min_number, c.chapter_range"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([volume_id.to_string()], Chapter::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// List every chapter of a series, ordered by volume then chapter.
pub fn list_chapters_for_series(conn: &Connection, series_id: SeriesId) -> Result<Vec<Chapter>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM chapters c JOIN volumes v ON v.id = c.volume_id
             WHERE v.series_id = ?1
             ORDER BY v.number, v.lookup_name, c.sort_order, c.min_number, c.chapter_range"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], Chapter::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Get a chapter by ID.
pub fn get_chapter(conn: &Connection, id: ChapterId) -> Result<Option<Chapter>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM chapters c WHERE c.id = ?1"),
        [id.to_string()],
        Chapter::from_row,
    );
    match result {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

pub fn insert_chapter(conn: &Connection, chapter: &Chapter) -> Result<()> {
    conn.execute(
        "INSERT INTO chapters (id, volume_id, chapter_range, min_number, max_number, is_special,
            title, title_locked, summary, summary_locked, language, language_locked,
            age_rating, age_rating_locked, isbn, isbn_locked, sort_order, sort_order_locked,
            release_date, release_date_locked, pages, total_count, count, web_links,
            word_count, genres_locked, tags_locked, locked_roles, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,
                 ?21,?22,?23,?24,?25,?26,?27,?28,?29)",
        rusqlite::params![
            chapter.id.to_string(),
            chapter.volume_id.to_string(),
            chapter.range,
            chapter.min_number,
            chapter.max_number,
            chapter.is_special,
            chapter.title,
            chapter.title_locked,
            chapter.summary,
            chapter.summary_locked,
            chapter.language,
            chapter.language_locked,
            chapter.age_rating.as_str(),
            chapter.age_rating_locked,
            chapter.isbn,
            chapter.isbn_locked,
            chapter.sort_order,
            chapter.sort_order_locked,
            chapter.release_date,
            chapter.release_date_locked,
            chapter.pages,
            chapter.total_count,
            chapter.count,
            chapter.web_links,
            chapter.word_count,
            chapter.genres_locked,
            chapter.tags_locked,
            to_json_list(&chapter.locked_roles)?,
            chapter.created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Persist every scanner-owned column of `chapter`.
///
/// `word_count` is left alone; it belongs to the word counter.
pub fn update_chapter(conn: &Connection, chapter: &Chapter) -> Result<()> {
    conn.execute(
        "UPDATE chapters SET volume_id = ?1, chapter_range = ?2, min_number = ?3,
            max_number = ?4, is_special = ?5, title = ?6, title_locked = ?7, summary = ?8,
            summary_locked = ?9, language = ?10, language_locked = ?11, age_rating = ?12,
            age_rating_locked = ?13, isbn = ?14, isbn_locked = ?15, sort_order = ?16,
            sort_order_locked = ?17, release_date = ?18, release_date_locked = ?19,
            pages = ?20, total_count = ?21, count = ?22, web_links = ?23,
            genres_locked = ?24, tags_locked = ?25, locked_roles = ?26
         WHERE id = ?27",
        rusqlite::params![
            chapter.volume_id.to_string(),
            chapter.range,
            chapter.min_number,
            chapter.max_number,
            chapter.is_special,
            chapter.title,
            chapter.title_locked,
            chapter.summary,
            chapter.summary_locked,
            chapter.language,
            chapter.language_locked,
            chapter.age_rating.as_str(),
            chapter.age_rating_locked,
            chapter.isbn,
            chapter.isbn_locked,
            chapter.sort_order,
            chapter.sort_order_locked,
            chapter.release_date,
            chapter.release_date_locked,
            chapter.pages,
            chapter.total_count,
            chapter.count,
            chapter.web_links,
            chapter.genres_locked,
            chapter.tags_locked,
            to_json_list(&chapter.locked_roles)?,
            chapter.id.to_string(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Store the word count computed for a chapter.
pub fn set_word_count(conn: &Connection, id: ChapterId, word_count: i64) -> Result<()> {
    conn.execute(
        "UPDATE chapters SET word_count = ?1 WHERE id = ?2",
        rusqlite::params![word_count, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete a chapter (cascades to its files).
pub fn delete_chapter(conn: &Connection, id: ChapterId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM chapters WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete chapters that no longer have any file.
pub fn delete_orphans(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM chapters WHERE id NOT IN (SELECT chapter_id FROM files)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}

// ---------------------------------------------------------------------------
// Associations
// ---------------------------------------------------------------------------

pub fn list_chapter_people(conn: &Connection, chapter_id: ChapterId) -> Result<Vec<PersonLink>> {
    let mut stmt = conn
        .prepare(
            "SELECT person_id, role, kavita_plus_connection FROM chapter_people
             WHERE chapter_id = ?1 ORDER BY role, person_id",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([chapter_id.to_string()], PersonLink::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn add_chapter_person(conn: &Connection, chapter_id: ChapterId, link: &PersonLink) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO chapter_people (chapter_id, person_id, role, kavita_plus_connection)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            chapter_id.to_string(),
            link.person_id.to_string(),
            link.role.as_str(),
            link.kavita_plus_connection,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn remove_chapter_person(
    conn: &Connection,
    chapter_id: ChapterId,
    person_id: PersonId,
    role: PersonRole,
) -> Result<()> {
    conn.execute(
        "DELETE FROM chapter_people WHERE chapter_id = ?1 AND person_id = ?2 AND role = ?3",
        rusqlite::params![chapter_id.to_string(), person_id.to_string(), role.as_str()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn list_chapter_genres(conn: &Connection, chapter_id: ChapterId) -> Result<Vec<GenreId>> {
    let mut stmt = conn
        .prepare("SELECT genre_id FROM chapter_genres WHERE chapter_id = ?1 ORDER BY genre_id")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([chapter_id.to_string()], |row| parse_id(row, 0))
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn add_chapter_genre(conn: &Connection, chapter_id: ChapterId, genre_id: GenreId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO chapter_genres (chapter_id, genre_id) VALUES (?1, ?2)",
        rusqlite::params![chapter_id.to_string(), genre_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn remove_chapter_genre(conn: &Connection, chapter_id: ChapterId, genre_id: GenreId) -> Result<()> {
    conn.execute(
        "DELETE FROM chapter_genres WHERE chapter_id = ?1 AND genre_id = ?2",
        rusqlite::params![chapter_id.to_string(), genre_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn list_chapter_tags(conn: &Connection, chapter_id: ChapterId) -> Result<Vec<TagId>> {
    let mut stmt = conn
        .prepare("SELECT tag_id FROM chapter_tags WHERE chapter_id = ?1 ORDER BY tag_id")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([chapter_id.to_string()], |row| parse_id(row, 0))
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn add_chapter_tag(conn: &Connection, chapter_id: ChapterId, tag_id: TagId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO chapter_tags (chapter_id, tag_id) VALUES (?1, ?2)",
        rusqlite::params![chapter_id.to_string(), tag_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn remove_chapter_tag(conn: &Connection, chapter_id: ChapterId, tag_id: TagId) -> Result<()> {
    conn.execute(
        "DELETE FROM chapter_tags WHERE chapter_id = ?1 AND tag_id = ?2",
        rusqlite::params![chapter_id.to_string(), tag_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::{people, test_support};
    use folio_common::AgeRating;

    #[test]
    fn insert_update_roundtrip() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let volume = test_support::volume(&conn, &series, "1");
        let mut chapter = test_support::chapter(&conn, &volume, "1");

        assert_eq!(get_chapter(&conn, chapter.id).unwrap().unwrap(), chapter);

        chapter.title = "The Black Swordsman".into();
        chapter.title_locked = true;
        chapter.age_rating = AgeRating::Mature;
        chapter.locked_roles = vec![PersonRole::Colorist];
        update_chapter(&conn, &chapter).unwrap();
        assert_eq!(get_chapter(&conn, chapter.id).unwrap().unwrap(), chapter);

        set_word_count(&conn, chapter.id, 1234).unwrap();
        let counted = get_chapter(&conn, chapter.id).unwrap().unwrap();
        assert_eq!(counted.word_count, 1234);

        // update_chapter must not clobber the word count.
        update_chapter(&conn, &chapter).unwrap();
        assert_eq!(get_chapter(&conn, chapter.id).unwrap().unwrap().word_count, 1234);
    }

    #[test]
    fn series_listing_orders_by_volume() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let v2 = test_support::volume(&conn, &series, "2");
        let v1 = test_support::volume(&conn, &series, "1");
        test_support::chapter(&conn, &v2, "10");
        test_support::chapter(&conn, &v1, "2");
        test_support::chapter(&conn, &v1, "1");

        let ranges: Vec<String> = list_chapters_for_series(&conn, series.id)
            .unwrap()
            .into_iter()
            .map(|c| c.range)
            .collect();
        assert_eq!(ranges, vec!["1", "2", "10"]);
    }

    #[test]
    fn chapter_people_links() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let volume = test_support::volume(&conn, &series, "1");
        let chapter = test_support::chapter(&conn, &volume, "1");
        let person = people::create_people(&conn, &[("Jane Doe".into(), "janedoe".into())])
            .unwrap()
            .remove(0);

        let link = PersonLink {
            person_id: person.id,
            role: PersonRole::Writer,
            kavita_plus_connection: false,
        };
        add_chapter_person(&conn, chapter.id, &link).unwrap();
        assert_eq!(list_chapter_people(&conn, chapter.id).unwrap(), vec![link]);

        remove_chapter_person(&conn, chapter.id, person.id, PersonRole::Writer).unwrap();
        assert!(list_chapter_people(&conn, chapter.id).unwrap().is_empty());
    }

    #[test]
    fn chapters_without_files_are_orphans() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let volume = test_support::volume(&conn, &series, "1");
        test_support::chapter(&conn, &volume, "1");

        assert_eq!(delete_orphans(&conn).unwrap(), 1);
        assert!(list_chapters(&conn, volume.id).unwrap().is_empty());
    }
}
