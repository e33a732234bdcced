//! Table-driven application of scanned values to lockable fields.
//!
//! Each lockable field is one [`LockedField`] row: how to read its lock and
//! how to copy the computed value into it. Adding a lockable field means
//! adding a row, not another `if !locked` branch.

use folio_common::{AgeRating, PublicationStatus};
use folio_db::models::{Chapter, Series, SeriesMetadata};

/// One lockable field of `T`, fed from a computed source `S`.
pub struct LockedField<T, S> {
    pub name: &'static str,
    pub is_locked: fn(&T) -> bool,
    /// Copy the source value into the target; returns whether it changed.
    pub apply: fn(&mut T, &S) -> bool,
}

/// Apply every unlocked field. Returns the names of fields that changed.
pub fn apply_unlocked<T, S>(fields: &[LockedField<T, S>], target: &mut T, source: &S) -> Vec<&'static str> {
    let mut changed = Vec::new();
    for field in fields {
        if !(field.is_locked)(target) && (field.apply)(target, source) {
            changed.push(field.name);
        }
    }
    changed
}

fn assign<V: PartialEq + Clone>(slot: &mut V, value: &V) -> bool {
    if slot == value {
        return false;
    }
    *slot = value.clone();
    true
}

/// Assign only when the source has a value.
fn assign_some<V: PartialEq + Clone>(slot: &mut V, value: &Option<V>) -> bool {
    match value {
        Some(v) => assign(slot, v),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Chapter
// ---------------------------------------------------------------------------

/// Values a chapter takes from its file's embedded metadata. `None` means
/// the file says nothing and the stored value is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterValues {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub language: Option<String>,
    pub age_rating: Option<AgeRating>,
    pub isbn: Option<String>,
    pub sort_order: Option<f64>,
    pub release_date: Option<Option<String>>,
}

pub const CHAPTER_FIELDS: &[LockedField<Chapter, ChapterValues>] = &[
    LockedField {
        name: "title",
        is_locked: |c| c.title_locked,
        apply: |c, v| assign_some(&mut c.title, &v.title),
    },
    LockedField {
        name: "summary",
        is_locked: |c| c.summary_locked,
        apply: |c, v| assign_some(&mut c.summary, &v.summary),
    },
    LockedField {
        name: "language",
        is_locked: |c| c.language_locked,
        apply: |c, v| assign_some(&mut c.language, &v.language),
    },
    LockedField {
        name: "age_rating",
        is_locked: |c| c.age_rating_locked,
        apply: |c, v| assign_some(&mut c.age_rating, &v.age_rating),
    },
    LockedField {
        name: "isbn",
        is_locked: |c| c.isbn_locked,
        apply: |c, v| assign_some(&mut c.isbn, &v.isbn),
    },
    LockedField {
        name: "sort_order",
        is_locked: |c| c.sort_order_locked,
        apply: |c, v| assign_some(&mut c.sort_order, &v.sort_order),
    },
    LockedField {
        name: "release_date",
        is_locked: |c| c.release_date_locked,
        apply: |c, v| assign_some(&mut c.release_date, &v.release_date),
    },
];

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Series name fields taken from the batch's first file with metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesNames {
    pub sort_name: Option<String>,
    pub localized_name: Option<(String, String)>,
}

pub const SERIES_NAME_FIELDS: &[LockedField<Series, SeriesNames>] = &[
    LockedField {
        name: "sort_name",
        is_locked: |s| s.sort_name_locked,
        apply: |s, v| assign_some(&mut s.sort_name, &v.sort_name),
    },
    LockedField {
        name: "localized_name",
        is_locked: |s| s.localized_name_locked,
        apply: |s, v| match &v.localized_name {
            Some((name, normalized)) => {
                let a = assign(&mut s.localized_name, name);
                let b = assign(&mut s.normalized_localized_name, normalized);
                a || b
            }
            None => false,
        },
    },
];

/// Series-level values reduced from all chapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesValues {
    pub age_rating: AgeRating,
    pub release_year: i32,
    pub summary: Option<String>,
    pub language: Option<String>,
    pub web_links: Option<String>,
    pub publication_status: PublicationStatus,
}

pub const SERIES_FIELDS: &[LockedField<SeriesMetadata, SeriesValues>] = &[
    LockedField {
        name: "age_rating",
        is_locked: |m| m.age_rating_locked,
        apply: |m, v| assign(&mut m.age_rating, &v.age_rating),
    },
    LockedField {
        name: "release_year",
        is_locked: |m| m.release_year_locked,
        apply: |m, v| assign(&mut m.release_year, &v.release_year),
    },
    LockedField {
        name: "summary",
        is_locked: |m| m.summary_locked,
        apply: |m, v| assign_some(&mut m.summary, &v.summary),
    },
    LockedField {
        name: "language",
        is_locked: |m| m.language_locked,
        apply: |m, v| assign_some(&mut m.language, &v.language),
    },
    LockedField {
        name: "web_links",
        is_locked: |m| m.web_links_locked,
        apply: |m, v| assign_some(&mut m.web_links, &v.web_links),
    },
    LockedField {
        name: "publication_status",
        is_locked: |m| m.publication_status_locked,
        apply: |m, v| assign(&mut m.publication_status, &v.publication_status),
    },
];
