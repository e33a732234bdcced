//! Zip-backed reading of archives, epubs, PDFs and loose images.
//!
//! `.cbz`/`.zip` and `.epub` containers are read with the `zip` crate. Other
//! archive types (`.cbr`, `.cb7`, ...) are only readable when they are zip
//! files under a different extension, which is common in practice.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use folio_common::paths::{is_image_file, is_junk_name};
use folio_common::{Error, MangaFormat, Result};
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use sha2::{Digest, Sha256};

use super::ArchiveService;

const COMIC_INFO: &str = "comicinfo.xml";

static PDF_PAGE_REGEX: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r"(?-u)/Type\s*/Page(?:[^s]|$)").expect("pdf page regex should compile")
});

fn open_zip(path: &Path) -> Result<zip::ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::parse(format!("{}: {e}", path.display())))
}

/// Whether a zip entry is content, not a directory or OS metadata.
fn is_content_entry(name: &str) -> bool {
    if name.ends_with('/') || name.starts_with("__MACOSX") {
        return false;
    }
    let base = name.rsplit('/').next().unwrap_or(name);
    !is_junk_name(base)
}

/// Image entries of a zip archive in lexical order.
fn image_entries(archive: &zip::ZipArchive<BufReader<File>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| is_content_entry(name) && is_image_file(Path::new(name)))
        .map(String::from)
        .collect();
    names.sort();
    names
}

fn read_entry(archive: &mut zip::ZipArchive<BufReader<File>>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| Error::parse(format!("{name}: {e}")))?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// The image to use as a cover: an entry named `cover.*` when present,
/// else the first image. Returns the image extension and bytes.
pub fn extract_cover_image(path: &Path, format: MangaFormat) -> Result<Option<(String, Vec<u8>)>> {
    match format {
        MangaFormat::Image => {
            let bytes = std::fs::read(path)?;
            Ok(Some((extension_of(&path.to_string_lossy()), bytes)))
        }
        MangaFormat::Archive | MangaFormat::Epub => {
            let mut archive = open_zip(path)?;
            let images = image_entries(&archive);
            let named_cover = images.iter().find(|name| {
                Path::new(name.as_str())
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_lowercase().contains("cover"))
                    .unwrap_or(false)
            });
            let chosen = match (named_cover, format) {
                (Some(name), _) => name.clone(),
                (None, MangaFormat::Archive) => match images.first() {
                    Some(name) => name.clone(),
                    None => return Ok(None),
                },
                (None, _) => return Ok(None),
            };
            let bytes = read_entry(&mut archive, &chosen)?;
            Ok(Some((extension_of(&chosen), bytes)))
        }
        MangaFormat::Pdf | MangaFormat::Unknown => Ok(None),
    }
}

/// Text of every (x)html document in an epub, in archive order.
pub fn read_text_entries(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_zip(path)?;
    let names: Vec<String> = archive
        .file_names()
        .filter(|name| {
            let ext = extension_of(name);
            is_content_entry(name) && matches!(ext.as_str(), "xhtml" | "html" | "htm")
        })
        .map(String::from)
        .collect();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let bytes = read_entry(&mut archive, &name)?;
        out.push(String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(out)
}

/// Filesystem implementation of [`ArchiveService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchiveService;

impl ArchiveService for FsArchiveService {
    fn count_pages(&self, path: &Path, format: MangaFormat) -> Result<i64> {
        match format {
            MangaFormat::Image => Ok(1),
            MangaFormat::Archive => {
                let archive = open_zip(path)?;
                Ok(image_entries(&archive).len() as i64)
            }
            MangaFormat::Epub => {
                let archive = open_zip(path)?;
                let documents = archive
                    .file_names()
                    .filter(|name| {
                        is_content_entry(name)
                            && matches!(extension_of(name).as_str(), "xhtml" | "html" | "htm")
                    })
                    .count();
                Ok(documents as i64)
            }
            MangaFormat::Pdf => {
                let bytes = std::fs::read(path)?;
                let pages = PDF_PAGE_REGEX.find_iter(&bytes).count() as i64;
                Ok(pages.max(1))
            }
            MangaFormat::Unknown => Ok(0),
        }
    }

    fn hash_contents(&self, path: &Path) -> Result<String> {
        let mut file = BufReader::new(File::open(path)?);
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }

    fn read_embedded_metadata(&self, path: &Path, format: MangaFormat) -> Result<Option<Vec<u8>>> {
        if format != MangaFormat::Archive {
            return Ok(None);
        }
        let mut archive = open_zip(path)?;
        // prefer the root entry, accept one nested in a folder
        let mut candidates: Vec<String> = archive
            .file_names()
            .filter(|name| {
                name.rsplit('/')
                    .next()
                    .map(|base| base.eq_ignore_ascii_case(COMIC_INFO))
                    .unwrap_or(false)
            })
            .map(String::from)
            .collect();
        candidates.sort_by_key(|name| name.matches('/').count());
        match candidates.first() {
            Some(name) => Ok(Some(read_entry(&mut archive, name)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn counts_image_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        write_zip(
            &path,
            &[
                ("001.jpg", b"x"),
                ("002.png", b"x"),
                ("ComicInfo.xml", b"<ComicInfo/>"),
                ("__MACOSX/._001.jpg", b"x"),
                (".DS_Store", b"x"),
            ],
        );
        assert_eq!(FsArchiveService.count_pages(&path, MangaFormat::Archive).unwrap(), 2);
    }

    #[test]
    fn reads_comic_info_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        write_zip(&path, &[("001.jpg", b"x"), ("comicinfo.XML", b"<ComicInfo/>")]);
        let bytes = FsArchiveService
            .read_embedded_metadata(&path, MangaFormat::Archive)
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"<ComicInfo/>");
    }

    #[test]
    fn missing_comic_info_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        write_zip(&path, &[("001.jpg", b"x")]);
        assert!(FsArchiveService
            .read_embedded_metadata(&path, MangaFormat::Archive)
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbz");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(FsArchiveService.count_pages(&path, MangaFormat::Archive).is_err());
    }

    #[test]
    fn hash_is_stable_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"abc").unwrap();
        let hash = FsArchiveService.hash_contents(&path).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(FsArchiveService.count_pages(&path, MangaFormat::Image).unwrap(), 1);
    }

    #[test]
    fn cover_prefers_named_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cbz");
        write_zip(&path, &[("001.jpg", b"first"), ("cover.png", b"cover")]);
        let (ext, bytes) = extract_cover_image(&path, MangaFormat::Archive).unwrap().unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, b"cover");
    }

    #[test]
    fn epub_text_and_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_zip(
            &path,
            &[
                ("mimetype", b"application/epub+zip"),
                ("OEBPS/ch1.xhtml", b"<p>one two</p>"),
                ("OEBPS/ch2.xhtml", b"<p>three</p>"),
            ],
        );
        assert_eq!(FsArchiveService.count_pages(&path, MangaFormat::Epub).unwrap(), 2);
        assert_eq!(read_text_entries(&path).unwrap().len(), 2);
    }
}
