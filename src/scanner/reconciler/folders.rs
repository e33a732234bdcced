//! Where a series lives on disk.

use std::path::{Path, PathBuf};

use folio_common::paths::normalize_path;
use folio_db::models::Library;

/// Library root containing `path`.
fn root_of<'r>(roots: &'r [PathBuf], path: &Path) -> Option<&'r PathBuf> {
    roots
        .iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
}

/// Highest folder below a library root holding the series' files.
///
/// Files directly in a root resolve to the root itself. When files are
/// spread over several series folders the first one (sorted) is used and a
/// warning is logged.
pub fn series_folder_path(library: &Library, series_name: &str, files: &[&str]) -> Option<String> {
    let roots: Vec<PathBuf> = library
        .folders
        .iter()
        .map(|f| normalize_path(Path::new(f)))
        .collect();

    let mut folders: Vec<PathBuf> = Vec::new();
    for file in files {
        let path = Path::new(file);
        let Some(root) = root_of(&roots, path) else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let mut components = relative.components();
        let folder = match (components.next(), components.next()) {
            (Some(first), Some(_)) => root.join(first.as_os_str()),
            _ => root.clone(),
        };
        if !folders.contains(&folder) {
            folders.push(folder);
        }
    }
    folders.sort();

    match folders.len() {
        0 => {
            tracing::warn!(series = %series_name, "Could not resolve a series folder, using the library root");
            roots.first().map(|r| r.to_string_lossy().into_owned())
        }
        1 => folders.first().map(|f| f.to_string_lossy().into_owned()),
        n => {
            tracing::warn!(
                series = %series_name,
                folders = n,
                "Series files are spread across several folders; keep a series in one folder for faster scans"
            );
            folders.first().map(|f| f.to_string_lossy().into_owned())
        }
    }
}

/// Deepest directory containing every file.
pub fn lowest_folder_path(files: &[&str]) -> Option<String> {
    let mut common: Option<PathBuf> = None;
    for file in files {
        let parent = Path::new(file).parent()?.to_path_buf();
        common = Some(match common {
            None => parent,
            Some(current) => current
                .components()
                .zip(parent.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a.as_os_str())
                .collect(),
        });
    }
    common
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_common::{LibraryId, LibraryType};

    fn library() -> Library {
        Library {
            id: LibraryId::new(),
            name: "Manga".into(),
            library_type: LibraryType::Manga,
            folders: vec!["/library/manga".into()],
            file_types: Vec::new(),
            exclude_patterns: Vec::new(),
            manage_reading_lists: false,
            manage_collections: false,
            default_language: String::new(),
            remove_prefix_for_sort_name: false,
            last_scanned: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn series_folder_is_first_level_below_root() {
        let files = [
            "/library/manga/SeriesA/Vol 1/c01.cbz",
            "/library/manga/SeriesA/c02.cbz",
        ];
        assert_eq!(
            series_folder_path(&library(), "SeriesA", &files).as_deref(),
            Some("/library/manga/SeriesA")
        );
        assert_eq!(lowest_folder_path(&files).as_deref(), Some("/library/manga/SeriesA"));
    }

    #[test]
    fn loose_files_resolve_to_root() {
        let files = ["/library/manga/One Shot.cbz"];
        assert_eq!(
            series_folder_path(&library(), "One Shot", &files).as_deref(),
            Some("/library/manga")
        );
    }

    #[test]
    fn files_outside_roots_fall_back_to_root() {
        let files = ["/elsewhere/x.cbz"];
        assert_eq!(
            series_folder_path(&library(), "X", &files).as_deref(),
            Some("/library/manga")
        );
    }
}
