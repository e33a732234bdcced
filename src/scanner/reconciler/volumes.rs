//! Volume, chapter and file diff for one series.
//!
//! Runs in two phases. The first walks the batch volume by volume, matching
//! or creating volumes and chapters and attaching files. The second looks
//! at everything the series has in the database afterwards: volumes no info
//! names are removed, chapters nothing matched are removed once their files
//! are really gone, and page counts are recomputed bottom-up.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use folio_common::paths::file_stem_string;
use folio_common::{ChapterId, MangaFileId, Result, VolumeId};
use folio_db::models::{Chapter, MangaFile, Series, Volume};
use folio_db::queries::{chapters, files, volumes};
use folio_parser::numbers::{min_number_from_range, volume_display_name, DEFAULT_CHAPTER};
use folio_parser::ParserInfo;
use rusqlite::Connection;

use crate::services::ArchiveService;

/// What the volume pass did to the series tree.
#[derive(Debug, Default)]
pub struct VolumePass {
    /// The chapter each info landed in, as `(chapter, index into infos)`.
    pub chapter_infos: Vec<(ChapterId, usize)>,
    /// Chapters whose metadata must be refreshed from their file.
    pub refresh: HashSet<ChapterId>,
    pub chapters_added: usize,
    pub chapters_removed: usize,
    pub volumes_removed: usize,
    /// Whether any row was written.
    pub dirty: bool,
}

/// Whether an existing chapter is the one `info` describes.
///
/// Specials and `0`/`0` chapters are matched by file-derived range (or by
/// already owning the file); everything else by exact min/max numbers.
pub fn chapter_matches(chapter: &Chapter, chapter_files: &[MangaFile], info: &ParserInfo) -> bool {
    let owns_file = || chapter_files.iter().any(|f| f.file_path == info.full_file_path);
    if info.is_special_info() {
        return chapter.is_special
            && (chapter.range == file_stem_string(Path::new(&info.full_file_path)) || owns_file());
    }
    if chapter.is_special {
        return false;
    }
    let (min, max) = (info.min_number(), info.max_number());
    if min == 0.0 && max == 0.0 {
        return chapter.range == info.chapters || owns_file();
    }
    chapter.min_number == min && chapter.max_number == max
}

fn new_chapter(volume_id: VolumeId, info: &ParserInfo, special_order: f64) -> Chapter {
    let is_special = info.is_special_info();
    let range = if is_special {
        file_stem_string(Path::new(&info.full_file_path))
    } else {
        info.chapters.clone()
    };
    let (min_number, max_number) = if is_special {
        let n = min_number_from_range(DEFAULT_CHAPTER);
        (n, n)
    } else {
        (info.min_number(), info.max_number())
    };
    Chapter {
        id: ChapterId::new(),
        volume_id,
        range,
        min_number,
        max_number,
        is_special,
        title: info.title.clone(),
        title_locked: false,
        summary: String::new(),
        summary_locked: false,
        language: String::new(),
        language_locked: false,
        age_rating: Default::default(),
        age_rating_locked: false,
        isbn: String::new(),
        isbn_locked: false,
        sort_order: if is_special { special_order } else { min_number },
        sort_order_locked: false,
        release_date: None,
        release_date_locked: false,
        pages: 0,
        total_count: 0,
        count: 0,
        web_links: String::new(),
        word_count: 0,
        genres_locked: false,
        tags_locked: false,
        locked_roles: Vec::new(),
        created_at: Utc::now().to_rfc3339(),
    }
}

fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn stored_seconds(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value).ok().map(|t| t.timestamp())
}

/// Page count, size, hash and mtime of the file on disk.
fn measure(file: &mut MangaFile, archive: &dyn ArchiveService) {
    let path = Path::new(&file.file_path);
    file.pages = match archive.count_pages(path, file.format) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::warn!(file = %file.file_path, error = %e, "Failed to count pages");
            0
        }
    };
    file.bytes = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);
    file.content_hash = match archive.hash_contents(path) {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(file = %file.file_path, error = %e, "Failed to hash file");
            None
        }
    };
    if let Some(modified) = file_modified(path) {
        file.last_modified = modified.to_rfc3339();
    }
}

fn extension_of(info: &ParserInfo) -> String {
    Path::new(&info.full_file_path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Attach the info's file to `chapter_id`, inserting or re-measuring it as
/// needed. Returns whether the file row was written.
fn attach_file(
    conn: &Connection,
    chapter_id: ChapterId,
    info: &ParserInfo,
    archive: &dyn ArchiveService,
    force: bool,
) -> Result<bool> {
    let path = Path::new(&info.full_file_path);
    match files::get_file_by_path(conn, &info.full_file_path)? {
        Some(mut file) => {
            let before = file.clone();
            file.chapter_id = chapter_id;
            file.format = info.format;
            file.extension = extension_of(info);

            let on_disk = file_modified(path).map(|t| t.timestamp());
            let advanced = match (on_disk, stored_seconds(&file.last_modified)) {
                (Some(now), Some(then)) => now > then,
                (Some(_), None) => true,
                _ => false,
            };
            if force || advanced || file.pages == 0 {
                measure(&mut file, archive);
            }

            if file == before {
                return Ok(false);
            }
            if before.chapter_id != chapter_id {
                tracing::debug!(file = %file.file_path, "File moved to another chapter");
            }
            files::update_file(conn, &file)?;
            Ok(true)
        }
        None => {
            let now = Utc::now().to_rfc3339();
            let mut file = MangaFile {
                id: MangaFileId::new(),
                chapter_id,
                file_path: info.full_file_path.clone(),
                extension: extension_of(info),
                format: info.format,
                pages: 0,
                bytes: 0,
                content_hash: None,
                last_modified: now.clone(),
                created_at: now,
            };
            measure(&mut file, archive);
            files::insert_file(conn, &file)?;
            tracing::debug!(file = %file.file_path, pages = file.pages, "Added file");
            Ok(true)
        }
    }
}

/// Reconcile the volume/chapter/file tree of `series` with `infos`.
pub fn reconcile_volumes(
    conn: &Connection,
    series: &Series,
    infos: &[ParserInfo],
    archive: &dyn ArchiveService,
    force: bool,
) -> Result<VolumePass> {
    let mut pass = VolumePass::default();
    let batch_paths: HashSet<&str> = infos.iter().map(|i| i.full_file_path.as_str()).collect();

    let mut tokens: Vec<&str> = Vec::new();
    for info in infos {
        if !tokens.contains(&info.volumes.as_str()) {
            tokens.push(&info.volumes);
        }
    }

    let existing = volumes::list_volumes(conn, series.id)?;
    let mut matched_chapters: HashSet<ChapterId> = HashSet::new();

    for token in &tokens {
        let volume = match existing.iter().find(|v| v.lookup_name == *token) {
            Some(v) => v.clone(),
            None => {
                let volume = Volume {
                    id: VolumeId::new(),
                    series_id: series.id,
                    name: volume_display_name(token),
                    lookup_name: token.to_string(),
                    number: min_number_from_range(token),
                    pages: 0,
                    created_at: Utc::now().to_rfc3339(),
                };
                volumes::insert_volume(conn, &volume)?;
                tracing::debug!(series = %series.name, volume = %token, "Added volume");
                pass.dirty = true;
                volume
            }
        };

        let mut volume_chapters = chapters::list_chapters(conn, volume.id)?;
        let mut chapter_files: HashMap<ChapterId, Vec<MangaFile>> = HashMap::new();
        for chapter in &volume_chapters {
            chapter_files.insert(chapter.id, files::list_files(conn, chapter.id)?);
        }

        for (idx, info) in infos.iter().enumerate().filter(|(_, i)| i.volumes == *token) {
            let found = volume_chapters
                .iter()
                .find(|c| {
                    let owned = chapter_files.get(&c.id).map(Vec::as_slice).unwrap_or(&[]);
                    chapter_matches(c, owned, info)
                })
                .map(|c| c.id);
            let chapter_id = match found {
                Some(id) => id,
                None => {
                    let specials = volume_chapters.iter().filter(|c| c.is_special).count();
                    let chapter = new_chapter(volume.id, info, specials as f64 + 1.0);
                    chapters::insert_chapter(conn, &chapter)?;
                    tracing::debug!(series = %series.name, range = %chapter.range, "Added chapter");
                    pass.dirty = true;
                    pass.chapters_added += 1;
                    pass.refresh.insert(chapter.id);
                    let id = chapter.id;
                    chapter_files.insert(id, Vec::new());
                    volume_chapters.push(chapter);
                    id
                }
            };

            if attach_file(conn, chapter_id, info, archive, force)? {
                pass.dirty = true;
                pass.refresh.insert(chapter_id);
            } else if force {
                pass.refresh.insert(chapter_id);
            }
            if let Some(owned) = chapter_files.get_mut(&chapter_id) {
                if !owned.iter().any(|f| f.file_path == info.full_file_path) {
                    if let Some(file) = files::get_file_by_path(conn, &info.full_file_path)? {
                        owned.push(file);
                    }
                }
            }
            matched_chapters.insert(chapter_id);
            pass.chapter_infos.push((chapter_id, idx));
        }
    }

    // Phase two: removals and page totals over the final tree.
    for volume in volumes::list_volumes(conn, series.id)? {
        if !tokens.contains(&volume.lookup_name.as_str()) {
            remove_volume(conn, series, &volume)?;
            pass.volumes_removed += 1;
            pass.dirty = true;
            continue;
        }

        let mut volume_pages = 0;
        for mut chapter in chapters::list_chapters(conn, volume.id)? {
            let chapter_files = files::list_files(conn, chapter.id)?;

            if !matched_chapters.contains(&chapter.id) {
                let gone = chapter_files.iter().all(|f| {
                    !batch_paths.contains(f.file_path.as_str()) && !Path::new(&f.file_path).exists()
                });
                if gone {
                    chapters::delete_chapter(conn, chapter.id)?;
                    tracing::info!(series = %series.name, range = %chapter.range, "Removed chapter with no files");
                    pass.chapters_removed += 1;
                    pass.dirty = true;
                    continue;
                }
                tracing::debug!(series = %series.name, range = %chapter.range, "Keeping unmatched chapter, its files still exist");
            }

            let mut pages = 0;
            for file in &chapter_files {
                if matched_chapters.contains(&chapter.id) && !batch_paths.contains(file.file_path.as_str()) {
                    files::delete_file(conn, file.id)?;
                    tracing::debug!(file = %file.file_path, "Removed file no longer on disk");
                    pass.dirty = true;
                    continue;
                }
                pages += file.pages;
            }

            if chapter.pages != pages {
                chapter.pages = pages;
                chapters::update_chapter(conn, &chapter)?;
                pass.dirty = true;
            }
            volume_pages += pages;
        }

        if volume.pages != volume_pages {
            let mut volume = volume;
            volume.pages = volume_pages;
            volumes::update_volume(conn, &volume)?;
            pass.dirty = true;
        }
    }

    Ok(pass)
}

/// Delete a volume no info names any more. A backing file that still exists
/// usually means a volume marker was renamed.
fn remove_volume(conn: &Connection, series: &Series, volume: &Volume) -> Result<()> {
    let mut still_on_disk = Vec::new();
    for chapter in chapters::list_chapters(conn, volume.id)? {
        for file in files::list_files(conn, chapter.id)? {
            if Path::new(&file.file_path).exists() {
                still_on_disk.push(file.file_path);
            }
        }
    }
    if !still_on_disk.is_empty() {
        tracing::warn!(
            series = %series.name,
            volume = %volume.lookup_name,
            files = ?still_on_disk,
            "Removing volume whose files still exist on disk; was the volume marker renamed?"
        );
    }
    volumes::delete_volume(conn, volume.id)?;
    tracing::info!(series = %series.name, volume = %volume.lookup_name, "Removed volume");
    Ok(())
}
