//! Path utilities for classifying library files by extension.
//!
//! The scanner uses these to decide which files belong to a library and what
//! [`MangaFormat`] they carry.

use std::path::{Component, Path, PathBuf};

use crate::MangaFormat;

/// Supported comic archive extensions.
const ARCHIVE_EXTENSIONS: &[&str] = &["cbz", "zip", "cbr", "rar", "cb7", "7z", "cbt", "tar"];

/// Supported image extensions (loose image series).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];

/// Directory and file names that are never library content.
const JUNK_NAMES: &[&str] = &["__MACOSX", "@eaDir", ".DS_Store", "Thumbs.db", "@Recently-Snapshot", ".yacreaderlibrary"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a path has a comic archive extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use folio_common::paths::is_archive_file;
///
/// assert!(is_archive_file(Path::new("Berserk v01.cbz")));
/// assert!(!is_archive_file(Path::new("cover.png")));
/// ```
pub fn is_archive_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a path has an image extension.
pub fn is_image_file(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Determine the [`MangaFormat`] of a path, or `None` when the extension is
/// not something a library can hold.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use folio_common::MangaFormat;
/// use folio_common::paths::format_for_path;
///
/// assert_eq!(format_for_path(Path::new("book.epub")), Some(MangaFormat::Epub));
/// assert_eq!(format_for_path(Path::new("notes.txt")), None);
/// ```
pub fn format_for_path(path: &Path) -> Option<MangaFormat> {
    let ext = extension_of(path)?;
    if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MangaFormat::Archive)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MangaFormat::Image)
    } else if ext == "epub" {
        Some(MangaFormat::Epub)
    } else if ext == "pdf" {
        Some(MangaFormat::Pdf)
    } else {
        None
    }
}

/// Whether a file or directory name should never be scanned: hidden entries
/// and the metadata droppings of NAS boxes and desktop OSes.
pub fn is_junk_name(name: &str) -> bool {
    name.starts_with('.') || JUNK_NAMES.iter().any(|j| j.eq_ignore_ascii_case(name))
}

/// Lexically normalize a path: drop `.` components and resolve `..` without
/// touching the filesystem. Used for comparing stored and scanned paths.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// File name without its extension, as used for special-chapter ranges.
pub fn file_stem_string(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_path_case_insensitive() {
        assert_eq!(format_for_path(Path::new("A.CBZ")), Some(MangaFormat::Archive));
        assert_eq!(format_for_path(Path::new("b.PDF")), Some(MangaFormat::Pdf));
        assert_eq!(format_for_path(Path::new("c.Png")), Some(MangaFormat::Image));
        assert_eq!(format_for_path(Path::new("noext")), None);
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("page01.jpg")));
        assert!(!is_image_file(Path::new("vol.cbz")));
    }

    #[test]
    fn test_junk_names() {
        assert!(is_junk_name(".hidden"));
        assert!(is_junk_name("__MACOSX"));
        assert!(is_junk_name("@eadir"));
        assert!(!is_junk_name("Berserk"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/lib/./Series/../Other/v01.cbz")),
            PathBuf::from("/lib/Other/v01.cbz")
        );
    }

    #[test]
    fn test_file_stem_string() {
        assert_eq!(file_stem_string(Path::new("/x/Series SP01.cbz")), "Series SP01");
    }
}
