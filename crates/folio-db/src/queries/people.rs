//! Person rows, deduplicated globally by normalized name and alias.

use folio_common::{Error, PersonId, Result};
use rusqlite::Connection;

use super::collect_rows;
use crate::models::Person;

const COLS: &str = "id, name, normalized_name";

/// List every person.
pub fn list_people(conn: &Connection) -> Result<Vec<Person>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLS} FROM people ORDER BY normalized_name"))
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Person::from_row)
        .map_err(|e| Error::database(e.to_string()))?;
    collect_rows(rows)
}

/// Find a person by normalized name, falling back to their aliases.
pub fn find_by_normalized(conn: &Connection, normalized: &str) -> Result<Option<Person>> {
    let result = conn.query_row(
        &format!(
            "SELECT {COLS} FROM people WHERE normalized_name = ?1
             UNION ALL
             SELECT p.id, p.name, p.normalized_name FROM people p
               JOIN person_aliases a ON a.person_id = p.id
              WHERE a.normalized_alias = ?1
             LIMIT 1"
        ),
        [normalized],
        Person::from_row,
    );
    match result {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Resolve every `(name, normalized_name)` pair to a person, inserting the
/// ones that do not exist yet. The result is in input order.
pub fn create_people(conn: &Connection, names: &[(String, String)]) -> Result<Vec<Person>> {
    let mut out = Vec::with_capacity(names.len());
    for (name, normalized) in names {
        if let Some(existing) = find_by_normalized(conn, normalized)? {
            out.push(existing);
            continue;
        }
        let person = Person {
            id: PersonId::new(),
            name: name.clone(),
            normalized_name: normalized.clone(),
        };
        conn.execute(
            "INSERT INTO people (id, name, normalized_name) VALUES (?1, ?2, ?3)",
            rusqlite::params![person.id.to_string(), person.name, person.normalized_name],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        out.push(person);
    }
    Ok(out)
}

/// Record an alternate spelling for a person.
pub fn add_alias(conn: &Connection, person_id: PersonId, alias: &str, normalized: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO person_aliases (person_id, alias, normalized_alias)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![person_id.to_string(), alias, normalized],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Delete people no series or chapter references. Returns the number removed.
pub fn delete_orphans(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM people
         WHERE id NOT IN (SELECT person_id FROM series_people)
           AND id NOT IN (SELECT person_id FROM chapter_people)",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}
