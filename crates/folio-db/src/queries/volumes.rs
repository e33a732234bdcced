//! Volume CRUD operations.

use folio_common::{Error, Result, SeriesId, VolumeId};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::Volume;

const COLS: &str = "id, series_id, name, lookup_name, number, pages, created_at";

/// List the volumes of a series ordered by number.
pub fn list_volumes(conn: &Connection, series_id: SeriesId) -> Result<Vec<Volume>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM volumes WHERE series_id = ?1 ORDER BY number, lookup_name"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([series_id.to_string()], Volume::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

pub fn insert_volume(conn: &Connection, volume: &Volume) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO volumes ({COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        rusqlite::params![
            volume.id.to_string(),
            volume.series_id.to_string(),
            volume.name,
            volume.lookup_name,
            volume.number,
            volume.pages,
            volume.created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn update_volume(conn: &Connection, volume: &Volume) -> Result<()> {
    conn.execute(
        "UPDATE volumes SET name = ?1, lookup_name = ?2, number = ?3, pages = ?4 WHERE id = ?5",
        rusqlite::params![
            volume.name,
            volume.lookup_name,
            volume.number,
            volume.pages,
            volume.id.to_string(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete a volume (cascades to its chapters and files).
pub fn delete_volume(conn: &Connection, id: VolumeId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM volumes WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete volumes that no longer hold any chapter.
pub fn delete_orphans(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM volumes WHERE id NOT IN (SELECT volume_id FROM chapters)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::test_support;

    #[test]
    fn lookup_names_are_exact_strings() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");

        test_support::volume(&conn, &series, "1");
        test_support::volume(&conn, &series, "1.0");

        let volumes = list_volumes(&conn, series.id).unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].number, volumes[1].number);
    }

    #[test]
    fn update_and_delete() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Berserk");
        let mut volume = test_support::volume(&conn, &series, "2");

        volume.pages = 180;
        update_volume(&conn, &volume).unwrap();
        assert_eq!(list_volumes(&conn, series.id).unwrap()[0], volume);

        assert_eq!(delete_orphans(&conn).unwrap(), 1);
        assert!(!delete_volume(&conn, volume.id).unwrap());
    }
}
