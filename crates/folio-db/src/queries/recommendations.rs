//! External recommendations waiting to be linked to a local series.

use chrono::Utc;
use folio_common::{Error, Result, SeriesId};
use rusqlite::Connection;
use uuid::Uuid;

use super::collect_rows;
use crate::models::ExternalRecommendation;

const COLS: &str = "id, name, normalized_name, series_id, created_at";

/// Record a recommendation for a series that may not exist locally yet.
pub fn create_recommendation(
    conn: &Connection,
    name: &str,
    normalized_name: &str,
) -> Result<ExternalRecommendation> {
    let rec = ExternalRecommendation {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        normalized_name: normalized_name.to_string(),
        series_id: None,
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        &format!("INSERT INTO external_recommendations ({COLS}) VALUES (?1, ?2, ?3, NULL, ?4)"),
        rusqlite::params![rec.id, rec.name, rec.normalized_name, rec.created_at],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(rec)
}

pub fn list_recommendations(conn: &Connection) -> Result<Vec<ExternalRecommendation>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLS} FROM external_recommendations ORDER BY created_at"
        ))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], ExternalRecommendation::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Point unlinked recommendations whose name matches any of
/// `normalized_names` at `series_id`. Returns the number linked.
pub fn link_pending(conn: &Connection, series_id: SeriesId, normalized_names: &[&str]) -> Result<usize> {
    let mut total = 0;
    for name in normalized_names.iter().filter(|n| !n.is_empty()) {
        total += conn
            .execute(
                "UPDATE external_recommendations SET series_id = ?1
                 WHERE series_id IS NULL AND normalized_name = ?2",
                rusqlite::params![series_id.to_string(), name],
            )
            .map_err(|e| Error::database(e.to_string()))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::test_support;

    #[test]
    fn pending_recommendations_link_by_name() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let lib = test_support::library(&conn);
        let series = test_support::series(&conn, &lib, "Vinland Saga");

        create_recommendation(&conn, "Vinland Saga", "vinlandsaga").unwrap();
        create_recommendation(&conn, "Planetes", "planetes").unwrap();

        assert_eq!(link_pending(&conn, series.id, &["vinlandsaga", ""]).unwrap(), 1);
        // already linked rows are left alone
        assert_eq!(link_pending(&conn, series.id, &["vinlandsaga"]).unwrap(), 0);

        let linked: Vec<_> = list_recommendations(&conn)
            .unwrap()
            .into_iter()
            .filter(|r| r.series_id == Some(series.id))
            .collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "Vinland Saga");
    }
}
