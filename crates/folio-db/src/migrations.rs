//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order.  A
//! `schema_migrations` table tracks which versions have been applied.

use folio_common::{Error, Result};
use rusqlite::Connection;

/// V1: initial catalog schema.
const V1_INITIAL: &str = r#"
CREATE TABLE libraries (
    id                          TEXT PRIMARY KEY,
    name                        TEXT NOT NULL UNIQUE,
    library_type                TEXT NOT NULL,
    folders                     TEXT NOT NULL,
    file_types                  TEXT NOT NULL,
    exclude_patterns            TEXT NOT NULL DEFAULT '[]',
    manage_reading_lists        INTEGER NOT NULL DEFAULT 0,
    manage_collections          INTEGER NOT NULL DEFAULT 0,
    default_language            TEXT NOT NULL DEFAULT '',
    remove_prefix_for_sort_name INTEGER NOT NULL DEFAULT 0,
    last_scanned                TEXT,
    created_at                  TEXT NOT NULL
);

CREATE TABLE series (
    id                        TEXT PRIMARY KEY,
    library_id                TEXT NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
    name                      TEXT NOT NULL,
    normalized_name           TEXT NOT NULL,
    localized_name            TEXT NOT NULL DEFAULT '',
    normalized_localized_name TEXT NOT NULL DEFAULT '',
    sort_name                 TEXT NOT NULL,
    sort_name_locked          INTEGER NOT NULL DEFAULT 0,
    localized_name_locked     INTEGER NOT NULL DEFAULT 0,
    original_name             TEXT NOT NULL,
    format                    TEXT NOT NULL,
    folder_path               TEXT,
    lowest_folder_path        TEXT,
    pages                     INTEGER NOT NULL DEFAULT 0,
    cover_image               TEXT,
    last_folder_scanned       TEXT,
    last_chapter_added        TEXT,
    created_at                TEXT NOT NULL
);
CREATE INDEX idx_series_library ON series(library_id);
CREATE INDEX idx_series_normalized ON series(library_id, format, normalized_name);
CREATE INDEX idx_series_localized ON series(library_id, format, normalized_localized_name);

CREATE TABLE series_metadata (
    series_id                 TEXT PRIMARY KEY REFERENCES series(id) ON DELETE CASCADE,
    summary                   TEXT NOT NULL DEFAULT '',
    summary_locked            INTEGER NOT NULL DEFAULT 0,
    age_rating                TEXT NOT NULL DEFAULT 'unknown',
    age_rating_locked         INTEGER NOT NULL DEFAULT 0,
    publication_status        TEXT NOT NULL DEFAULT 'ongoing',
    publication_status_locked INTEGER NOT NULL DEFAULT 0,
    language                  TEXT NOT NULL DEFAULT '',
    language_locked           INTEGER NOT NULL DEFAULT 0,
    release_year              INTEGER NOT NULL DEFAULT 0,
    release_year_locked       INTEGER NOT NULL DEFAULT 0,
    web_links                 TEXT NOT NULL DEFAULT '',
    web_links_locked          INTEGER NOT NULL DEFAULT 0,
    total_count               INTEGER NOT NULL DEFAULT 0,
    max_count                 INTEGER NOT NULL DEFAULT 0,
    genres_locked             INTEGER NOT NULL DEFAULT 0,
    tags_locked               INTEGER NOT NULL DEFAULT 0,
    locked_roles              TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE volumes (
    id          TEXT PRIMARY KEY,
    series_id   TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    lookup_name TEXT NOT NULL,
    number      REAL NOT NULL DEFAULT 0,
    pages       INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    UNIQUE (series_id, lookup_name)
);

CREATE TABLE chapters (
    id                  TEXT PRIMARY KEY,
    volume_id           TEXT NOT NULL REFERENCES volumes(id) ON DELETE CASCADE,
    chapter_range       TEXT NOT NULL,
    min_number          REAL NOT NULL DEFAULT 0,
    max_number          REAL NOT NULL DEFAULT 0,
    is_special          INTEGER NOT NULL DEFAULT 0,
    title               TEXT NOT NULL DEFAULT '',
    title_locked        INTEGER NOT NULL DEFAULT 0,
    summary             TEXT NOT NULL DEFAULT '',
    summary_locked      INTEGER NOT NULL DEFAULT 0,
    language            TEXT NOT NULL DEFAULT '',
    language_locked     INTEGER NOT NULL DEFAULT 0,
    age_rating          TEXT NOT NULL DEFAULT 'unknown',
    age_rating_locked   INTEGER NOT NULL DEFAULT 0,
    isbn                TEXT NOT NULL DEFAULT '',
    isbn_locked         INTEGER NOT NULL DEFAULT 0,
    sort_order          REAL NOT NULL DEFAULT 0,
    sort_order_locked   INTEGER NOT NULL DEFAULT 0,
    release_date        TEXT,
    release_date_locked INTEGER NOT NULL DEFAULT 0,
    pages               INTEGER NOT NULL DEFAULT 0,
    total_count         INTEGER NOT NULL DEFAULT 0,
    count               INTEGER NOT NULL DEFAULT 0,
    web_links           TEXT NOT NULL DEFAULT '',
    word_count          INTEGER NOT NULL DEFAULT 0,
    genres_locked       INTEGER NOT NULL DEFAULT 0,
    tags_locked         INTEGER NOT NULL DEFAULT 0,
    locked_roles        TEXT NOT NULL DEFAULT '[]',
    created_at          TEXT NOT NULL
);
CREATE INDEX idx_chapters_volume ON chapters(volume_id);

CREATE TABLE files (
    id            TEXT PRIMARY KEY,
    chapter_id    TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    file_path     TEXT NOT NULL UNIQUE,
    extension     TEXT NOT NULL,
    format        TEXT NOT NULL,
    pages         INTEGER NOT NULL DEFAULT 0,
    bytes         INTEGER NOT NULL DEFAULT 0,
    content_hash  TEXT,
    last_modified TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX idx_files_chapter ON files(chapter_id);

CREATE TABLE people (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE
);

CREATE TABLE person_aliases (
    person_id        TEXT NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    alias            TEXT NOT NULL,
    normalized_alias TEXT NOT NULL UNIQUE,
    PRIMARY KEY (person_id, normalized_alias)
);

CREATE TABLE series_people (
    series_id              TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    person_id              TEXT NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    role                   TEXT NOT NULL,
    kavita_plus_connection INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (series_id, person_id, role)
);

CREATE TABLE chapter_people (
    chapter_id             TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    person_id              TEXT NOT NULL REFERENCES people(id) ON DELETE CASCADE,
    role                   TEXT NOT NULL,
    kavita_plus_connection INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (chapter_id, person_id, role)
);

CREATE TABLE genres (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    normalized_title TEXT NOT NULL UNIQUE
);

CREATE TABLE tags (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    normalized_title TEXT NOT NULL UNIQUE
);

CREATE TABLE series_genres (
    series_id TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    genre_id  TEXT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (series_id, genre_id)
);

CREATE TABLE series_tags (
    series_id TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    tag_id    TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (series_id, tag_id)
);

CREATE TABLE chapter_genres (
    chapter_id TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    genre_id   TEXT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (chapter_id, genre_id)
);

CREATE TABLE chapter_tags (
    chapter_id TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    tag_id     TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (chapter_id, tag_id)
);
"#;

/// V2: recommendations sourced from an external matcher, linked to local
/// series by name once a scan finds them.
const V2_EXTERNAL_RECOMMENDATIONS: &str = r#"
CREATE TABLE external_recommendations (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    series_id       TEXT REFERENCES series(id) ON DELETE SET NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX idx_external_recommendations_name ON external_recommendations(normalized_name);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_EXTERNAL_RECOMMENDATIONS)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        tracing::debug!(version, "applied migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_all_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "libraries",
            "series",
            "series_metadata",
            "volumes",
            "chapters",
            "files",
            "people",
            "person_aliases",
            "series_people",
            "chapter_people",
            "genres",
            "tags",
            "series_genres",
            "series_tags",
            "chapter_genres",
            "chapter_tags",
            "external_recommendations",
            "schema_migrations",
        ];
        for t in &tables {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [t],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {t} should exist");
        }
    }
}
