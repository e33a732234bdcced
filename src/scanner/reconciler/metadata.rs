//! Chapter metadata from embedded files and series-level aggregation.

use std::collections::{BTreeSet, HashSet};

use folio_common::{AgeRating, ChapterId, GenreId, PersonId, PersonRole, Result, TagId};
use folio_db::models::{Chapter, PersonLink, Series, SeriesMetadata};
use folio_db::queries::{chapters, metadata as series_meta, volumes};
use folio_parser::normalize::normalize;
use folio_parser::ParserInfo;
use rusqlite::Connection;

use super::status::{derive_counts, derive_status};
use crate::scanner::locks::{apply_unlocked, ChapterValues, SeriesValues, CHAPTER_FIELDS, SERIES_FIELDS};
use crate::scanner::lookup::{PersonCache, TagUniverse};
use crate::services::MetadataSettings;

/// Lookups shared by every chapter of a batch.
pub struct MetadataContext<'a> {
    pub settings: &'a MetadataSettings,
    pub universe: &'a TagUniverse,
    pub people: &'a PersonCache,
}

// ---------------------------------------------------------------------------
// Association diffs
// ---------------------------------------------------------------------------

/// People of one role to unlink and to link so that `existing` matches
/// `wanted`. Externally sourced links survive when the scan has nobody for
/// the role.
pub fn diff_people(
    existing: &[PersonLink],
    role: PersonRole,
    wanted: &BTreeSet<PersonId>,
) -> (Vec<PersonId>, Vec<PersonId>) {
    let current: Vec<&PersonLink> = existing.iter().filter(|l| l.role == role).collect();
    let remove = current
        .iter()
        .filter(|l| !wanted.contains(&l.person_id))
        .filter(|l| !(l.kavita_plus_connection && wanted.is_empty()))
        .map(|l| l.person_id)
        .collect();
    let add = wanted
        .iter()
        .filter(|id| !current.iter().any(|l| l.person_id == **id))
        .copied()
        .collect();
    (remove, add)
}

/// Ids to remove and add so that `existing` becomes `wanted`.
fn diff_ids<T: Copy + Ord>(existing: &[T], wanted: &BTreeSet<T>) -> (Vec<T>, Vec<T>) {
    let current: BTreeSet<T> = existing.iter().copied().collect();
    (
        current.difference(wanted).copied().collect(),
        wanted.difference(&current).copied().collect(),
    )
}

// ---------------------------------------------------------------------------
// Chapter
// ---------------------------------------------------------------------------

/// Values a chapter takes from its info.
pub fn chapter_values(info: &ParserInfo) -> ChapterValues {
    let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
    let mut values = ChapterValues {
        title: non_empty(info.title.as_str()),
        sort_order: (!info.is_special_info()).then(|| info.min_number()),
        ..Default::default()
    };
    if let Some(ci) = &info.comic_info {
        values.summary = non_empty(ci.summary());
        values.language = non_empty(ci.language());
        values.isbn = non_empty(ci.isbn());
        values.age_rating = Some(ci.age_rating()).filter(|r| *r != AgeRating::Unknown);
        values.release_date = ci.release_date().map(|d| Some(d.format("%Y-%m-%d").to_string()));
    }
    values
}

/// Refresh one chapter from its file's metadata. Returns whether anything
/// was written.
pub fn refresh_chapter(
    conn: &Connection,
    chapter: &mut Chapter,
    info: &ParserInfo,
    ctx: &MetadataContext<'_>,
) -> Result<bool> {
    let before = chapter.clone();
    let changed_fields = apply_unlocked(CHAPTER_FIELDS, chapter, &chapter_values(info));
    if !changed_fields.is_empty() {
        tracing::trace!(range = %chapter.range, fields = ?changed_fields, "Chapter fields changed");
    }

    let Some(ci) = &info.comic_info else {
        if *chapter != before {
            chapters::update_chapter(conn, chapter)?;
            return Ok(true);
        }
        return Ok(false);
    };

    chapter.total_count = ci.total_count();
    chapter.count = ci.calculated_count();
    chapter.web_links = ci.web_links();

    let mut written = false;
    if *chapter != before {
        chapters::update_chapter(conn, chapter)?;
        written = true;
    }

    let links = chapters::list_chapter_people(conn, chapter.id)?;
    for role in PersonRole::ALL {
        if chapter.is_role_locked(role) {
            continue;
        }
        let wanted: BTreeSet<PersonId> = ci
            .people(role)
            .iter()
            .filter_map(|name| ctx.people.get(&normalize(name)))
            .collect();
        let (remove, add) = diff_people(&links, role, &wanted);
        for person_id in &remove {
            chapters::remove_chapter_person(conn, chapter.id, *person_id, role)?;
        }
        for person_id in &add {
            let link = PersonLink {
                person_id: *person_id,
                role,
                kavita_plus_connection: false,
            };
            chapters::add_chapter_person(conn, chapter.id, &link)?;
        }
        written |= !remove.is_empty() || !add.is_empty();
    }

    if !chapter.genres_locked {
        let mut wanted: BTreeSet<GenreId> = BTreeSet::new();
        for title in ci.genres() {
            let normalized = normalize(&title);
            if !normalized.is_empty() && ctx.settings.allows_genre(&normalized) {
                wanted.insert(ctx.universe.genre_id(conn, &title, &normalized)?);
            }
        }
        let (remove, add) = diff_ids(&chapters::list_chapter_genres(conn, chapter.id)?, &wanted);
        for id in &remove {
            chapters::remove_chapter_genre(conn, chapter.id, *id)?;
        }
        for id in &add {
            chapters::add_chapter_genre(conn, chapter.id, *id)?;
        }
        written |= !remove.is_empty() || !add.is_empty();
    }

    if !chapter.tags_locked {
        let mut wanted: BTreeSet<TagId> = BTreeSet::new();
        for title in ci.tag_list() {
            let normalized = normalize(&title);
            if !normalized.is_empty() && ctx.settings.allows_tag(&normalized) {
                wanted.insert(ctx.universe.tag_id(conn, &title, &normalized)?);
            }
        }
        let (remove, add) = diff_ids(&chapters::list_chapter_tags(conn, chapter.id)?, &wanted);
        for id in &remove {
            chapters::remove_chapter_tag(conn, chapter.id, *id)?;
        }
        for id in &add {
            chapters::add_chapter_tag(conn, chapter.id, *id)?;
        }
        written |= !remove.is_empty() || !add.is_empty();
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

fn release_year(chapter: &Chapter) -> i32 {
    chapter
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
        .unwrap_or(0)
}

/// Rating implied by the batch's genres and tags through the configured
/// mapping table.
fn mapped_rating(infos: &[ParserInfo], settings: &MetadataSettings) -> AgeRating {
    infos
        .iter()
        .filter_map(|i| i.comic_info.as_ref())
        .flat_map(|ci| ci.genres().into_iter().chain(ci.tag_list()))
        .filter_map(|title| settings.mapped_rating(&normalize(&title)))
        .max()
        .unwrap_or_default()
}

/// Reduce every chapter of the series into `metadata` and reconcile the
/// series' people, genres and tags. Scalar changes are left in `metadata`
/// for the caller to persist; association changes are written here.
/// Returns whether any association changed.
pub fn aggregate_series(
    conn: &Connection,
    series: &Series,
    metadata: &mut SeriesMetadata,
    chapter_infos: &[(ChapterId, usize)],
    infos: &[ParserInfo],
    settings: &MetadataSettings,
) -> Result<bool> {
    let all_chapters = chapters::list_chapters_for_series(conn, series.id)?;
    let all_volumes = volumes::list_volumes(conn, series.id)?;

    let with_metadata: HashSet<ChapterId> = chapter_infos
        .iter()
        .filter(|(_, idx)| infos.get(*idx).is_some_and(|i| i.comic_info.is_some()))
        .map(|(id, _)| *id)
        .collect();
    let first = all_chapters.iter().find(|c| with_metadata.contains(&c.id));

    let mut age_rating = all_chapters
        .iter()
        .map(|c| c.age_rating)
        .max()
        .unwrap_or_default();
    if settings.enable_extended_metadata {
        age_rating = age_rating.max(mapped_rating(infos, settings));
    }

    let release_year = all_chapters
        .iter()
        .map(release_year)
        .filter(|y| *y > 0)
        .min()
        .unwrap_or(0);

    let publication_status = match derive_counts(series.format, &all_volumes, &all_chapters) {
        Ok(counts) => {
            metadata.total_count = counts.total_count;
            metadata.max_count = counts.max_count;
            derive_status(counts)
        }
        Err(e) => {
            tracing::warn!(series = %series.name, error = %e, "Could not derive publication status, defaulting to OnGoing");
            Default::default()
        }
    };

    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let values = SeriesValues {
        age_rating,
        release_year,
        summary: first.and_then(|c| non_empty(c.summary.as_str())),
        language: first.and_then(|c| non_empty(c.language.as_str())),
        web_links: first.and_then(|c| non_empty(c.web_links.as_str())),
        publication_status,
    };
    let changed_fields = apply_unlocked(SERIES_FIELDS, metadata, &values);
    if !changed_fields.is_empty() {
        tracing::debug!(series = %series.name, fields = ?changed_fields, "Series metadata changed");
    }

    let mut links_changed = false;

    // people
    let mut chapter_people: Vec<PersonLink> = Vec::new();
    for chapter in &all_chapters {
        chapter_people.extend(chapters::list_chapter_people(conn, chapter.id)?);
    }
    let existing = series_meta::list_series_people(conn, series.id)?;
    for role in PersonRole::ALL {
        if metadata.is_role_locked(role) {
            continue;
        }
        let wanted: BTreeSet<PersonId> = chapter_people
            .iter()
            .filter(|l| l.role == role)
            .map(|l| l.person_id)
            .collect();
        let (remove, add) = diff_people(&existing, role, &wanted);
        for person_id in &remove {
            series_meta::remove_series_person(conn, series.id, *person_id, role)?;
        }
        for person_id in &add {
            let link = PersonLink {
                person_id: *person_id,
                role,
                kavita_plus_connection: false,
            };
            series_meta::add_series_person(conn, series.id, &link)?;
        }
        links_changed |= !remove.is_empty() || !add.is_empty();
    }

    if !metadata.genres_locked {
        let mut wanted: BTreeSet<GenreId> = BTreeSet::new();
        for chapter in &all_chapters {
            wanted.extend(chapters::list_chapter_genres(conn, chapter.id)?);
        }
        let (remove, add) = diff_ids(&series_meta::list_series_genres(conn, series.id)?, &wanted);
        for id in &remove {
            series_meta::remove_series_genre(conn, series.id, *id)?;
        }
        for id in &add {
            series_meta::add_series_genre(conn, series.id, *id)?;
        }
        links_changed |= !remove.is_empty() || !add.is_empty();
    }

    if !metadata.tags_locked {
        let mut wanted: BTreeSet<TagId> = BTreeSet::new();
        for chapter in &all_chapters {
            wanted.extend(chapters::list_chapter_tags(conn, chapter.id)?);
        }
        let (remove, add) = diff_ids(&series_meta::list_series_tags(conn, series.id)?, &wanted);
        for id in &remove {
            series_meta::remove_series_tag(conn, series.id, *id)?;
        }
        for id in &add {
            series_meta::add_series_tag(conn, series.id, *id)?;
        }
        links_changed |= !remove.is_empty() || !add.is_empty();
    }

    Ok(links_changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(person_id: PersonId, role: PersonRole, external: bool) -> PersonLink {
        PersonLink {
            person_id,
            role,
            kavita_plus_connection: external,
        }
    }

    #[test]
    fn external_links_survive_an_empty_role() {
        let external = PersonId::new();
        let existing = vec![link(external, PersonRole::Writer, true)];
        let (remove, add) = diff_people(&existing, PersonRole::Writer, &BTreeSet::new());
        assert!(remove.is_empty());
        assert!(add.is_empty());
    }

    #[test]
    fn external_links_are_replaced_by_scanned_people() {
        let external = PersonId::new();
        let scanned = PersonId::new();
        let existing = vec![link(external, PersonRole::Writer, true)];
        let wanted: BTreeSet<_> = [scanned].into();
        let (remove, add) = diff_people(&existing, PersonRole::Writer, &wanted);
        assert_eq!(remove, vec![external]);
        assert_eq!(add, vec![scanned]);
    }

    #[test]
    fn other_roles_are_ignored() {
        let penciller = PersonId::new();
        let existing = vec![link(penciller, PersonRole::Penciller, false)];
        let (remove, add) = diff_people(&existing, PersonRole::Writer, &BTreeSet::new());
        assert!(remove.is_empty() && add.is_empty());
    }

    #[test]
    fn chapter_values_skip_missing_fields() {
        let info = ParserInfo {
            series: "SeriesA".into(),
            series_sort: String::new(),
            localized_series: String::new(),
            volumes: "1".into(),
            chapters: "2".into(),
            filename: "SeriesA v01 c002.cbz".into(),
            full_file_path: "/l/SeriesA/SeriesA v01 c002.cbz".into(),
            format: folio_common::MangaFormat::Archive,
            title: String::new(),
            is_special: false,
            comic_info: Some(
                folio_parser::ComicInfo::from_xml(
                    "<ComicInfo><Summary>Plot</Summary><Year>2001</Year><Month>4</Month></ComicInfo>",
                )
                .unwrap(),
            ),
        };
        let values = chapter_values(&info);
        assert_eq!(values.title, None);
        assert_eq!(values.summary.as_deref(), Some("Plot"));
        assert_eq!(values.language, None);
        assert_eq!(values.age_rating, None);
        assert_eq!(values.sort_order, Some(2.0));
        assert_eq!(values.release_date, Some(Some("2001-04-01".to_string())));
    }
}
