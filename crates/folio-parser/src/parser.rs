//! File name heuristics and embedded metadata merging.

use std::path::Path;

use folio_common::paths::{file_stem_string, format_for_path};
use folio_common::{Error, LibraryType, MangaFormat, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::comic_info::ComicInfo;
use crate::normalize::remove_leading_zeroes;
use crate::numbers::{DEFAULT_CHAPTER, LOOSE_LEAF_VOLUME, SPECIAL_VOLUME};
use crate::types::ParserInfo;

static BRACKETS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").expect("bracket regex should compile"));

static VOLUME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s_.\-])(?:v|vol\.?|volume)\s*(\d+(?:\.\d+)?(?:-\d+(?:\.\d+)?)?)")
        .expect("volume regex should compile")
});

static CHAPTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s_.\-])(?:c|ch\.?|chapter|#)\s*(\d+(?:\.\d+)?(?:-\d+(?:\.\d+)?)?)")
        .expect("chapter regex should compile")
});

static SPECIAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s_.\-])(?:sp\s*\d+|specials?|omake|extras?|bonus)(?:$|[\s_.\-\d])")
        .expect("special regex should compile")
});

static BARE_NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<series>.*?)[\s_\-]+)?#?(?P<num>\d+(?:\.\d+)?)$")
        .expect("bare number regex should compile")
});

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Folder names whose content is always treated as specials.
const SPECIAL_FOLDERS: &[&str] = &["specials", "special", "extras", "omake"];

/// Turns a file path (and optional embedded metadata) into a [`ParserInfo`].
///
/// Implementations must be deterministic: the same inputs always produce
/// the same output.
pub trait Parser: Send + Sync {
    /// Parse `path`, a file somewhere below the library folder `root`.
    ///
    /// Returns `Ok(None)` for files the parser does not recognize.
    fn parse(
        &self,
        path: &Path,
        root: &Path,
        library_type: LibraryType,
        embedded: Option<&[u8]>,
    ) -> Result<Option<ParserInfo>>;
}

/// Regex based parser for common manga and comic naming schemes
/// (`Series v01 c001`, `Series Vol. 2`, `Series #12`, `Series SP01`),
/// refined by `ComicInfo.xml` when present.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParser;

impl DefaultParser {
    pub fn new() -> Self {
        Self
    }
}

/// Collapse separators and whitespace left over after cutting tokens out.
fn clean_series(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let collapsed = WHITESPACE_REGEX.replace_all(spaced.trim(), " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '.' | ',' | '#'))
        .to_string()
}

/// The first folder below `root` on the way to `path`, if the file is not
/// directly in the root.
fn series_folder(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}

fn in_special_folder(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative
        .parent()
        .map(|parent| {
            parent.components().any(|c| {
                let name = c.as_os_str().to_string_lossy().to_lowercase();
                SPECIAL_FOLDERS.contains(&name.as_str())
            })
        })
        .unwrap_or(false)
}

/// Fold embedded metadata into a filename-derived record. Embedded values
/// win wherever they are present.
fn apply_comic_info(info: &mut ParserInfo, comic_info: &ComicInfo) {
    if !comic_info.series().is_empty() {
        info.series = comic_info.series().to_string();
    }
    if !comic_info.localized_series().is_empty() {
        info.localized_series = comic_info.localized_series().to_string();
    }
    if !comic_info.series_sort().is_empty() {
        info.series_sort = comic_info.series_sort().to_string();
    }
    if !comic_info.title().is_empty() {
        info.title = comic_info.title().to_string();
    }
    if !comic_info.volume().is_empty() {
        info.volumes = remove_leading_zeroes(comic_info.volume());
    }
    if !comic_info.number().is_empty() {
        info.chapters = remove_leading_zeroes(comic_info.number());
        // a numbered issue is not a special even if its name looks like one
        info.is_special = false;
    }
    if comic_info.is_special_format() {
        info.is_special = true;
    }
}

impl Parser for DefaultParser {
    fn parse(
        &self,
        path: &Path,
        root: &Path,
        library_type: LibraryType,
        embedded: Option<&[u8]>,
    ) -> Result<Option<ParserInfo>> {
        let Some(format) = format_for_path(path) else {
            return Ok(None);
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::parse(format!("no file name in {}", path.display())))?;
        let stem = file_stem_string(path);
        let cleaned = BRACKETS_REGEX.replace_all(&stem, " ").replace('_', " ");
        let cleaned = cleaned.trim();

        let mut volumes = String::new();
        let mut chapters = String::new();
        let mut cut = cleaned.len();

        if let Some(caps) = VOLUME_REGEX.captures(cleaned) {
            if let (Some(all), Some(num)) = (caps.get(0), caps.get(1)) {
                volumes = remove_leading_zeroes(num.as_str());
                cut = cut.min(all.start());
            }
        }
        if let Some(caps) = CHAPTER_REGEX.captures(cleaned) {
            if let (Some(all), Some(num)) = (caps.get(0), caps.get(1)) {
                chapters = remove_leading_zeroes(num.as_str());
                cut = cut.min(all.start());
            }
        }

        let special_folder = in_special_folder(path, root);
        let mut is_special = special_folder;
        if let Some(m) = SPECIAL_REGEX.find(cleaned) {
            is_special = true;
            cut = cut.min(m.start());
        }

        let mut series = clean_series(&cleaned[..cut]);

        let allow_bare_number = volumes.is_empty()
            && chapters.is_empty()
            && !is_special
            && library_type != LibraryType::Book;
        if allow_bare_number {
            if let Some(caps) = BARE_NUMBER_REGEX.captures(cleaned) {
                if let Some(num) = caps.name("num") {
                    chapters = remove_leading_zeroes(num.as_str());
                    series = caps
                        .name("series")
                        .map(|s| clean_series(s.as_str()))
                        .unwrap_or_default();
                }
            }
        }

        if series.is_empty() || special_folder || format == MangaFormat::Image {
            series = series_folder(path, root).unwrap_or_else(|| clean_series(cleaned));
        }
        if series.is_empty() {
            series = stem.clone();
        }

        let title = if format.is_single_file_book() {
            clean_series(cleaned)
        } else {
            String::new()
        };

        let mut info = ParserInfo {
            series,
            series_sort: String::new(),
            localized_series: String::new(),
            volumes,
            chapters,
            filename,
            full_file_path: path.to_string_lossy().into_owned(),
            format,
            title,
            is_special,
            comic_info: None,
        };

        if let Some(bytes) = embedded {
            match ComicInfo::from_bytes(bytes) {
                Ok(comic_info) => {
                    apply_comic_info(&mut info, &comic_info);
                    info.comic_info = Some(comic_info);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable embedded metadata");
                }
            }
        }

        if info.is_special {
            info.volumes = SPECIAL_VOLUME.to_string();
            info.chapters = DEFAULT_CHAPTER.to_string();
        }
        if info.volumes.is_empty() {
            info.volumes = LOOSE_LEAF_VOLUME.to_string();
        }
        if info.chapters.is_empty() {
            info.chapters = DEFAULT_CHAPTER.to_string();
        }

        Ok(Some(info))
    }
}
