//! Library CRUD operations.

use chrono::Utc;
use folio_common::{Error, LibraryId, LibraryType, MangaFormat, Result};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::{to_json_list, Library};

const COLS: &str = "id, name, library_type, folders, file_types, exclude_patterns,
    manage_reading_lists, manage_collections, default_language,
    remove_prefix_for_sort_name, last_scanned, created_at";

/// Create a new library with default flags.
pub fn create_library(
    conn: &Connection,
    name: &str,
    library_type: LibraryType,
    folders: &[String],
    file_types: &[MangaFormat],
) -> Result<Library> {
    let library = Library {
        id: LibraryId::new(),
        name: name.to_string(),
        library_type,
        folders: folders.to_vec(),
        file_types: file_types.to_vec(),
        exclude_patterns: Vec::new(),
        manage_reading_lists: false,
        manage_collections: false,
        default_language: String::new(),
        remove_prefix_for_sort_name: false,
        last_scanned: None,
        created_at: Utc::now().to_rfc3339(),
    };

    conn.execute(
        &format!("INSERT INTO libraries ({COLS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)"),
        rusqlite::params![
            library.id.to_string(),
            library.name,
            library.library_type.as_str(),
            to_json_list(&library.folders)?,
            to_json_list(&library.file_types)?,
            to_json_list(&library.exclude_patterns)?,
            library.manage_reading_lists,
            library.manage_collections,
            library.default_language,
            library.remove_prefix_for_sort_name,
            library.last_scanned,
            library.created_at,
        ],
    )
    .map_err(|e| {
        if let rusqlite::Error::SqliteFailure(ref err, _) = e {
            if err.code == rusqlite::ErrorCode::ConstraintViolation {
                return Error::conflict(format!("library '{name}' already exists"));
            }
        }
        Error::database(e.to_string())
    })?;

    Ok(library)
}

/// Get a library by ID.
pub fn get_library(conn: &Connection, id: LibraryId) -> Result<Option<Library>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM libraries WHERE id = ?1"),
        [id.to_string()],
        Library::from_row,
    );
    match result {
        Ok(l) => Ok(Some(l)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a library by its (unique) name.
pub fn get_library_by_name(conn: &Connection, name: &str) -> Result<Option<Library>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM libraries WHERE name = ?1"),
        [name],
        Library::from_row,
    );
    match result {
        Ok(l) => Ok(Some(l)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all libraries ordered by name.
pub fn list_libraries(conn: &Connection) -> Result<Vec<Library>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLS} FROM libraries ORDER BY name"))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Library::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Persist every editable column of `library`.
pub fn update_library(conn: &Connection, library: &Library) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE libraries SET name = ?1, library_type = ?2, folders = ?3, file_types = ?4,
                exclude_patterns = ?5, manage_reading_lists = ?6, manage_collections = ?7,
                default_language = ?8, remove_prefix_for_sort_name = ?9
             WHERE id = ?10",
            rusqlite::params![
                library.name,
                library.library_type.as_str(),
                to_json_list(&library.folders)?,
                to_json_list(&library.file_types)?,
                to_json_list(&library.exclude_patterns)?,
                library.manage_reading_lists,
                library.manage_collections,
                library.default_language,
                library.remove_prefix_for_sort_name,
                library.id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Record when the library was last fully scanned.
pub fn set_last_scanned(conn: &Connection, id: LibraryId, at: &str) -> Result<()> {
    conn.execute(
        "UPDATE libraries SET last_scanned = ?1 WHERE id = ?2",
        rusqlite::params![at, id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete a library (cascades to series).
pub fn delete_library(conn: &Connection, id: LibraryId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM libraries WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn crud() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let lib = create_library(
            &conn,
            "Comics",
            LibraryType::Comic,
            &["/media/comics".into()],
            &[MangaFormat::Archive, MangaFormat::Pdf],
        )
        .unwrap();

        let found = get_library(&conn, lib.id).unwrap().unwrap();
        assert_eq!(found, lib);
        assert!(found.accepts(MangaFormat::Pdf));
        assert!(!found.accepts(MangaFormat::Epub));

        let mut edited = found.clone();
        edited.exclude_patterns = vec!["**/scans/**".into()];
        edited.remove_prefix_for_sort_name = true;
        assert!(update_library(&conn, &edited).unwrap());

        let by_name = get_library_by_name(&conn, "Comics").unwrap().unwrap();
        assert_eq!(by_name.exclude_patterns, vec!["**/scans/**".to_string()]);
        assert!(by_name.remove_prefix_for_sort_name);

        set_last_scanned(&conn, lib.id, "2024-01-01T00:00:00+00:00").unwrap();
        let scanned = get_library(&conn, lib.id).unwrap().unwrap();
        assert_eq!(scanned.last_scanned.as_deref(), Some("2024-01-01T00:00:00+00:00"));

        assert_eq!(list_libraries(&conn).unwrap().len(), 1);
        assert!(delete_library(&conn, lib.id).unwrap());
        assert!(get_library(&conn, lib.id).unwrap().is_none());
    }

    #[test]
    fn duplicate_name_is_conflict() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_library(&conn, "Manga", LibraryType::Manga, &[], &[]).unwrap();
        let err = create_library(&conn, "Manga", LibraryType::Manga, &[], &[]).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
