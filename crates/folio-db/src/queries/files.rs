//! File (physical archive / book) CRUD operations.

use folio_common::{ChapterId, Error, MangaFileId, Result, SeriesId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::MangaFile;

const COLS: &str = "f.id, f.chapter_id, f.file_path, f.extension, f.format, f.pages, f.bytes,
    f.content_hash, f.last_modified, f.created_at";

/// List the files backing a chapter.
pub fn list_files(conn: &Connection, chapter_id: ChapterId) -> Result<Vec<MangaFile>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM files f WHERE f.chapter_id = ?1 ORDER BY f.file_path"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([chapter_id.to_string()], MangaFile::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// List every file of a series.
pub fn list_files_for_series(conn: &Connection, series_id: SeriesId) -> Result<Vec<MangaFile>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM files f
               JOIN chapters c ON c.id = f.chapter_id
               JOIN volumes v ON v.id = c.volume_id
             WHERE v.series_id = ?1
             ORDER BY f.file_path"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], MangaFile::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Look up a file by its path.
pub fn get_file_by_path(conn: &Connection, file_path: &str) -> Result<Option<MangaFile>> {
    let result = conn.query_row(
        &format!("SELECT {COLS} FROM files f WHERE f.file_path = ?1"),
        [file_path],
        MangaFile::from_row,
    );
    match result {
        Ok(f) => Ok(Some(f)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

pub fn insert_file(conn: &Connection, file: &MangaFile) -> Result<()> {
    conn.execute(
        "INSERT INTO files (id, chapter_id, file_path, extension, format, pages, bytes,
            content_hash, last_modified, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            file.id.to_string(),
            file.chapter_id.to_string(),
            file.file_path,
            file.extension,
            file.format.as_str(),
            file.pages,
            file.bytes,
            file.content_hash,
            file.last_modified,
            file.created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn update_file(conn: &Connection, file: &MangaFile) -> Result<()> {
    conn.execute(
        "UPDATE files SET chapter_id = ?1, file_path = ?2, extension = ?3, format = ?4,
            pages = ?5, bytes = ?6, content_hash = ?7, last_modified = ?8
         WHERE id = ?9",
        rusqlite::params![
            file.chapter_id.to_string(),
            file.file_path,
            file.extension,
            file.format.as_str(),
            file.pages,
            file.bytes,
            file.content_hash,
            file.last_modified,
            file.id.to_string(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn delete_file(conn: &Connection, id: MangaFileId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM files WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::test_support;
    use chrono::Utc;
    use folio_common::MangaFormat;

    fn file(chapter_id: ChapterId, path: &str) -> MangaFile {
        MangaFile {
            id: MangaFileId::new(),
            chapter_id,
            file_path: path.into(),
            extension: "cbz".into(),
            format: MangaFormat::Archive,
            pages: 20,
            bytes: 4096,
            content_hash: Some("abc".into()),
            last_modified: Utc::now().to_rfc3339(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn crud_and_series_listing() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let volume = test_support::volume(&conn, &series, "1");
        let chapter = test_support::chapter(&conn, &volume, "1");

        let mut a = file(chapter.id, "/m/Berserk/v01 c001.cbz");
        let b = file(chapter.id, "/m/Berserk/v01 c001 (alt).cbz");
        insert_file(&conn, &a).unwrap();
        insert_file(&conn, &b).unwrap();

        assert_eq!(list_files(&conn, chapter.id).unwrap().len(), 2);
        assert_eq!(list_files_for_series(&conn, series.id).unwrap().len(), 2);

        a.pages = 24;
        update_file(&conn, &a).unwrap();
        assert_eq!(get_file_by_path(&conn, &a.file_path).unwrap().unwrap(), a);

        assert!(delete_file(&conn, b.id).unwrap());
        assert!(get_file_by_path(&conn, &b.file_path).unwrap().is_none());
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let volume = test_support::volume(&conn, &series, "1");
        let chapter = test_support::chapter(&conn, &volume, "1");

        insert_file(&conn, &file(chapter.id, "/m/x.cbz")).unwrap();
        assert!(insert_file(&conn, &file(chapter.id, "/m/x.cbz")).is_err());
    }
}
