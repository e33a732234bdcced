//! Scan-scoped lookup tables for people, genres and tags.
//!
//! Both are filled by bulk create-missing passes before any chapter is
//! written: genres and tags once per scan, people once per series batch.

use std::collections::HashMap;

use folio_common::{Error, GenreId, PersonId, Result, TagId};
use folio_db::queries::{genres, people, tags};
use folio_db::pool::write_transaction;
use folio_parser::normalize::normalize;
use folio_parser::ParserInfo;
use rusqlite::Connection;

use crate::services::MetadataSettings;

/// Normalized person name to id.
#[derive(Debug, Default)]
pub struct PersonCache {
    by_name: HashMap<String, PersonId>,
}

impl PersonCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every person credited in `infos`, creating the missing ones,
    /// in a transaction of its own. Returns how many names were resolved
    /// against the database.
    pub fn preload(&mut self, conn: &mut Connection, infos: &[ParserInfo]) -> Result<usize> {
        let mut wanted: Vec<(String, String)> = Vec::new();
        for comic_info in infos.iter().filter_map(|i| i.comic_info.as_ref()) {
            for (_, name) in comic_info.all_people() {
                let normalized = normalize(&name);
                if normalized.is_empty()
                    || self.by_name.contains_key(&normalized)
                    || wanted.iter().any(|(_, n)| *n == normalized)
                {
                    continue;
                }
                wanted.push((name, normalized));
            }
        }
        if wanted.is_empty() {
            return Ok(0);
        }

        let tx = write_transaction(conn)?;
        let resolved = people::create_people(&tx, &wanted)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        for ((_, normalized), person) in wanted.iter().zip(&resolved) {
            self.by_name.insert(normalized.clone(), person.id);
        }
        Ok(resolved.len())
    }

    pub fn get(&self, normalized: &str) -> Option<PersonId> {
        self.by_name.get(normalized).copied()
    }
}

/// Every genre and tag the current scan can reference.
#[derive(Debug, Default)]
pub struct TagUniverse {
    genres: HashMap<String, GenreId>,
    tags: HashMap<String, TagId>,
}

impl TagUniverse {
    /// Create every allowed genre and tag mentioned by `infos` in one
    /// transaction.
    pub fn build<'i>(
        conn: &mut Connection,
        infos: impl IntoIterator<Item = &'i ParserInfo>,
        settings: &MetadataSettings,
    ) -> Result<Self> {
        let mut genre_titles: Vec<(String, String)> = Vec::new();
        let mut tag_titles: Vec<(String, String)> = Vec::new();
        for comic_info in infos.into_iter().filter_map(|i| i.comic_info.as_ref()) {
            for title in comic_info.genres() {
                let normalized = normalize(&title);
                if settings.allows_genre(&normalized) && !genre_titles.iter().any(|(_, n)| *n == normalized) {
                    genre_titles.push((title, normalized));
                }
            }
            for title in comic_info.tag_list() {
                let normalized = normalize(&title);
                if settings.allows_tag(&normalized) && !tag_titles.iter().any(|(_, n)| *n == normalized) {
                    tag_titles.push((title, normalized));
                }
            }
        }

        let tx = write_transaction(conn)?;
        let created_genres = genres::create_missing(&tx, &genre_titles)?;
        let created_tags = tags::create_missing(&tx, &tag_titles)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        Ok(Self {
            genres: created_genres
                .into_iter()
                .map(|g| (g.normalized_title, g.id))
                .collect(),
            tags: created_tags
                .into_iter()
                .map(|t| (t.normalized_title, t.id))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.genres.len() + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of a genre, creating it when the universe missed it.
    pub fn genre_id(&self, conn: &Connection, title: &str, normalized: &str) -> Result<GenreId> {
        if let Some(id) = self.genres.get(normalized) {
            return Ok(*id);
        }
        genres::create_missing(conn, &[(title.to_string(), normalized.to_string())])?
            .pop()
            .map(|g| g.id)
            .ok_or_else(|| Error::internal(format!("genre '{title}' was not created")))
    }

    /// Id of a tag, creating it when the universe missed it.
    pub fn tag_id(&self, conn: &Connection, title: &str, normalized: &str) -> Result<TagId> {
        if let Some(id) = self.tags.get(normalized) {
            return Ok(*id);
        }
        tags::create_missing(conn, &[(title.to_string(), normalized.to_string())])?
            .pop()
            .map(|t| t.id)
            .ok_or_else(|| Error::internal(format!("tag '{title}' was not created")))
    }
}
