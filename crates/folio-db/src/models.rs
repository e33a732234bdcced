//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`, reading columns in the order of the owning query
//! module's `COLS` constant. Models derive `PartialEq` so callers can compare
//! a row before and after an in-memory edit and skip writes that change
//! nothing.

use std::str::FromStr;

use folio_common::{
    AgeRating, ChapterId, GenreId, LibraryId, LibraryType, MangaFileId, MangaFormat, PersonId,
    PersonRole, PublicationStatus, SeriesId, TagId, VolumeId,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
pub(crate) fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))?;
    Ok(T::from(uuid))
}

fn parse_opt_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => {
            let uuid = Uuid::parse_str(&v).map_err(|e| conversion_error(idx, e))?;
            Ok(Some(T::from(uuid)))
        }
        None => Ok(None),
    }
}

/// Parse one of the text-stored domain enums.
fn parse_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = folio_common::Error>,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

/// Parse a JSON array column, treating garbage as empty.
fn parse_json_list<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Vec<T>> {
    let s: String = row.get(idx)?;
    Ok(serde_json::from_str(&s).unwrap_or_default())
}

/// Serialize a list for a JSON text column.
pub(crate) fn to_json_list<T: serde::Serialize>(items: &[T]) -> folio_common::Result<String> {
    serde_json::to_string(items).map_err(|e| folio_common::Error::internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub library_type: LibraryType,
    /// Root folders scanned for this library.
    pub folders: Vec<String>,
    /// Formats this library accepts; files of other formats are ignored.
    pub file_types: Vec<MangaFormat>,
    /// Glob patterns (relative to a root) that are never scanned.
    pub exclude_patterns: Vec<String>,
    pub manage_reading_lists: bool,
    pub manage_collections: bool,
    pub default_language: String,
    /// Strip leading articles ("The", "A") when deriving sort names.
    pub remove_prefix_for_sort_name: bool,
    pub last_scanned: Option<String>,
    pub created_at: String,
}

impl Library {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            library_type: parse_enum(row, 2)?,
            folders: parse_json_list(row, 3)?,
            file_types: parse_json_list(row, 4)?,
            exclude_patterns: parse_json_list(row, 5)?,
            manage_reading_lists: row.get(6)?,
            manage_collections: row.get(7)?,
            default_language: row.get(8)?,
            remove_prefix_for_sort_name: row.get(9)?,
            last_scanned: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    /// Whether files of `format` belong in this library.
    pub fn accepts(&self, format: MangaFormat) -> bool {
        self.file_types.is_empty() || self.file_types.contains(&format)
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: SeriesId,
    pub library_id: LibraryId,
    pub name: String,
    pub normalized_name: String,
    pub localized_name: String,
    pub normalized_localized_name: String,
    pub sort_name: String,
    pub sort_name_locked: bool,
    pub localized_name_locked: bool,
    pub original_name: String,
    pub format: MangaFormat,
    /// Highest folder below a library root that holds this series.
    pub folder_path: Option<String>,
    /// Deepest folder containing every file of the series.
    pub lowest_folder_path: Option<String>,
    pub pages: i64,
    pub cover_image: Option<String>,
    pub last_folder_scanned: Option<String>,
    pub last_chapter_added: Option<String>,
    pub created_at: String,
}

impl Series {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            library_id: parse_id(row, 1)?,
            name: row.get(2)?,
            normalized_name: row.get(3)?,
            localized_name: row.get(4)?,
            normalized_localized_name: row.get(5)?,
            sort_name: row.get(6)?,
            sort_name_locked: row.get(7)?,
            localized_name_locked: row.get(8)?,
            original_name: row.get(9)?,
            format: parse_enum(row, 10)?,
            folder_path: row.get(11)?,
            lowest_folder_path: row.get(12)?,
            pages: row.get(13)?,
            cover_image: row.get(14)?,
            last_folder_scanned: row.get(15)?,
            last_chapter_added: row.get(16)?,
            created_at: row.get(17)?,
        })
    }
}

// ---------------------------------------------------------------------------
// SeriesMetadata
// ---------------------------------------------------------------------------

/// Series-level aggregate metadata; one row per series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesMetadata {
    pub series_id: SeriesId,
    pub summary: String,
    pub summary_locked: bool,
    pub age_rating: AgeRating,
    pub age_rating_locked: bool,
    pub publication_status: PublicationStatus,
    pub publication_status_locked: bool,
    pub language: String,
    pub language_locked: bool,
    pub release_year: i32,
    pub release_year_locked: bool,
    pub web_links: String,
    pub web_links_locked: bool,
    pub total_count: i32,
    pub max_count: i32,
    pub genres_locked: bool,
    pub tags_locked: bool,
    /// People roles the user curated by hand.
    pub locked_roles: Vec<PersonRole>,
}

impl SeriesMetadata {
    /// Fresh, unlocked metadata for a new series.
    pub fn new(series_id: SeriesId) -> Self {
        Self {
            series_id,
            summary: String::new(),
            summary_locked: false,
            age_rating: AgeRating::Unknown,
            age_rating_locked: false,
            publication_status: PublicationStatus::OnGoing,
            publication_status_locked: false,
            language: String::new(),
            language_locked: false,
            release_year: 0,
            release_year_locked: false,
            web_links: String::new(),
            web_links_locked: false,
            total_count: 0,
            max_count: 0,
            genres_locked: false,
            tags_locked: false,
            locked_roles: Vec::new(),
        }
    }

    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            series_id: parse_id(row, 0)?,
            summary: row.get(1)?,
            summary_locked: row.get(2)?,
            age_rating: parse_enum(row, 3)?,
            age_rating_locked: row.get(4)?,
            publication_status: parse_enum(row, 5)?,
            publication_status_locked: row.get(6)?,
            language: row.get(7)?,
            language_locked: row.get(8)?,
            release_year: row.get(9)?,
            release_year_locked: row.get(10)?,
            web_links: row.get(11)?,
            web_links_locked: row.get(12)?,
            total_count: row.get(13)?,
            max_count: row.get(14)?,
            genres_locked: row.get(15)?,
            tags_locked: row.get(16)?,
            locked_roles: parse_json_list(row, 17)?,
        })
    }

    pub fn is_role_locked(&self, role: PersonRole) -> bool {
        self.locked_roles.contains(&role)
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub id: VolumeId,
    pub series_id: SeriesId,
    /// Display name.
    pub name: String,
    /// Raw volume token from the parser; identity within a series.
    pub lookup_name: String,
    pub number: f64,
    pub pages: i64,
    pub created_at: String,
}

impl Volume {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            series_id: parse_id(row, 1)?,
            name: row.get(2)?,
            lookup_name: row.get(3)?,
            number: row.get(4)?,
            pages: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Chapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: ChapterId,
    pub volume_id: VolumeId,
    pub range: String,
    pub min_number: f64,
    pub max_number: f64,
    pub is_special: bool,
    pub title: String,
    pub title_locked: bool,
    pub summary: String,
    pub summary_locked: bool,
    pub language: String,
    pub language_locked: bool,
    pub age_rating: AgeRating,
    pub age_rating_locked: bool,
    pub isbn: String,
    pub isbn_locked: bool,
    pub sort_order: f64,
    pub sort_order_locked: bool,
    pub release_date: Option<String>,
    pub release_date_locked: bool,
    pub pages: i64,
    pub total_count: i32,
    pub count: i32,
    pub web_links: String,
    pub word_count: i64,
    pub genres_locked: bool,
    pub tags_locked: bool,
    pub locked_roles: Vec<PersonRole>,
    pub created_at: String,
}

impl Chapter {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            volume_id: parse_id(row, 1)?,
            range: row.get(2)?,
            min_number: row.get(3)?,
            max_number: row.get(4)?,
            is_special: row.get(5)?,
            title: row.get(6)?,
            title_locked: row.get(7)?,
            summary: row.get(8)?,
            summary_locked: row.get(9)?,
            language: row.get(10)?,
            language_locked: row.get(11)?,
            age_rating: parse_enum(row, 12)?,
            age_rating_locked: row.get(13)?,
            isbn: row.get(14)?,
            isbn_locked: row.get(15)?,
            sort_order: row.get(16)?,
            sort_order_locked: row.get(17)?,
            release_date: row.get(18)?,
            release_date_locked: row.get(19)?,
            pages: row.get(20)?,
            total_count: row.get(21)?,
            count: row.get(22)?,
            web_links: row.get(23)?,
            word_count: row.get(24)?,
            genres_locked: row.get(25)?,
            tags_locked: row.get(26)?,
            locked_roles: parse_json_list(row, 27)?,
            created_at: row.get(28)?,
        })
    }

    pub fn is_role_locked(&self, role: PersonRole) -> bool {
        self.locked_roles.contains(&role)
    }
}

// ---------------------------------------------------------------------------
// MangaFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MangaFile {
    pub id: MangaFileId,
    pub chapter_id: ChapterId,
    pub file_path: String,
    pub extension: String,
    pub format: MangaFormat,
    pub pages: i64,
    pub bytes: i64,
    pub content_hash: Option<String>,
    /// File mtime (RFC 3339) at the last measurement.
    pub last_modified: String,
    pub created_at: String,
}

impl MangaFile {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            chapter_id: parse_id(row, 1)?,
            file_path: row.get(2)?,
            extension: row.get(3)?,
            format: parse_enum(row, 4)?,
            pages: row.get(5)?,
            bytes: row.get(6)?,
            content_hash: row.get(7)?,
            last_modified: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

// ---------------------------------------------------------------------------
// People, genres, tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub normalized_name: String,
}

impl Person {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            normalized_name: row.get(2)?,
        })
    }
}

/// A role-tagged association between a person and a series or chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersonLink {
    pub person_id: PersonId,
    pub role: PersonRole,
    /// Set when the link came from an external matcher, not a scan.
    pub kavita_plus_connection: bool,
}

impl PersonLink {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            person_id: parse_id(row, 0)?,
            role: parse_enum(row, 1)?,
            kavita_plus_connection: row.get(2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: GenreId,
    pub title: String,
    pub normalized_title: String,
}

impl Genre {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            title: row.get(1)?,
            normalized_title: row.get(2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: TagId,
    pub title: String,
    pub normalized_title: String,
}

impl Tag {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            title: row.get(1)?,
            normalized_title: row.get(2)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ExternalRecommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecommendation {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    /// Local series this recommendation resolved to, once one exists.
    pub series_id: Option<SeriesId>,
    pub created_at: String,
}

impl ExternalRecommendation {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            normalized_name: row.get(2)?,
            series_id: parse_opt_id(row, 3)?,
            created_at: row.get(4)?,
        })
    }
}
