//! Scans that must stop early or skip a series.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{comic_info, drain, TestLibrary};
use folio_common::events::EventPayload;
use folio_common::{Error, LibraryType, MangaFormat, Result, SeriesId};
use folio_db::models::Series;
use folio_db::queries::series as series_q;
use folio_parser::{DefaultParser, Parser, ParserInfo};

/// Parser that takes its time, keeping a scan in flight.
struct SlowParser;

impl Parser for SlowParser {
    fn parse(
        &self,
        path: &Path,
        root: &Path,
        library_type: LibraryType,
        embedded: Option<&[u8]>,
    ) -> Result<Option<ParserInfo>> {
        std::thread::sleep(Duration::from_millis(300));
        DefaultParser.parse(path, root, library_type, embedded)
    }
}

fn stored_series(lib: &TestLibrary, name: &str, normalized: &str, localized: &str) -> Series {
    Series {
        id: SeriesId::new(),
        library_id: lib.library.id,
        name: name.into(),
        normalized_name: normalized.into(),
        localized_name: localized.into(),
        normalized_localized_name: localized.to_lowercase(),
        sort_name: name.into(),
        sort_name_locked: false,
        localized_name_locked: false,
        original_name: name.into(),
        format: MangaFormat::Archive,
        folder_path: None,
        lowest_folder_path: None,
        pages: 0,
        cover_image: None,
        last_folder_scanned: None,
        last_chapter_added: None,
        created_at: Utc::now().to_rfc3339(),
    }
}

#[tokio::test]
async fn missing_root_aborts_without_touching_the_catalog() {
    let lib = TestLibrary::new();
    lib.add_archive("SeriesA/SeriesA v01.cbz", 2, None);
    let scanner = lib.scanner();
    scanner.scan_library(lib.library.id, false).await.unwrap();
    let before = lib.snapshot();

    std::fs::remove_dir_all(&lib.root).unwrap();
    let mut rx = lib.subscribe();
    let err = scanner.scan_library(lib.library.id, false).await.unwrap_err();

    assert_matches!(err, Error::NotFound(_));
    assert_eq!(lib.snapshot(), before);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(&e.payload, EventPayload::ScanError { title, .. } if title.contains("Manga"))));
}

#[tokio::test]
async fn empty_root_with_existing_series_aborts() {
    let lib = TestLibrary::new();
    lib.add_archive("SeriesA/SeriesA v01.cbz", 2, None);
    let scanner = lib.scanner();
    scanner.scan_library(lib.library.id, false).await.unwrap();

    std::fs::remove_dir_all(lib.root.join("SeriesA")).unwrap();
    let err = scanner.scan_library(lib.library.id, false).await.unwrap_err();

    assert_matches!(err, Error::InvalidInput(_));
    assert_eq!(lib.series().len(), 1);
}

#[tokio::test]
async fn empty_root_of_a_new_library_is_fine() {
    let lib = TestLibrary::new();
    let outcome = lib.scanner().scan_library(lib.library.id, false).await.unwrap();
    assert_eq!(outcome.series_processed, 0);
    assert!(lib.series().is_empty());
}

#[tokio::test]
async fn concurrent_scan_of_the_same_library_is_rejected() {
    let lib = TestLibrary::new();
    lib.add_archive("SeriesA/SeriesA v01.cbz", 1, None);
    let scanner = lib.scanner().with_parser(Arc::new(SlowParser));
    let library_id = lib.library.id;

    let background = scanner.clone();
    let first = tokio::spawn(async move { background.scan_library(library_id, false).await });

    let mut waited = 0;
    while !scanner.is_scanning(library_id) {
        assert!(waited < 200, "first scan never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }

    let err = scanner.scan_library(library_id, false).await.unwrap_err();
    assert_matches!(err, Error::Conflict(_));

    first.await.unwrap().unwrap();
    assert!(!scanner.is_scanning(library_id));
    scanner.scan_library(library_id, false).await.unwrap();
}

#[tokio::test]
async fn ambiguous_identity_skips_only_that_series() {
    let lib = TestLibrary::new();
    lib.add_archive(
        "SeriesA/SeriesA v01 c001.cbz",
        2,
        Some(&comic_info(&[("Series", "SeriesA"), ("Number", "1")])),
    );
    lib.add_archive("Monster/Monster c001.cbz", 2, None);

    let conn = lib.conn();
    let by_name = stored_series(&lib, "SeriesA", "seriesa", "");
    let by_localized = stored_series(&lib, "Other", "other", "SeriesA");
    series_q::insert_series(&conn, &by_name).unwrap();
    series_q::insert_series(&conn, &by_localized).unwrap();
    drop(conn);

    let mut rx = lib.subscribe();
    let outcome = lib.scanner().scan_library(lib.library.id, false).await.unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.added, 1);
    assert!(lib.volumes(by_name.id).is_empty());
    assert!(lib.volumes(by_localized.id).is_empty());
    assert_eq!(lib.volumes(lib.series_named("Monster").id).len(), 1);
    assert!(drain(&mut rx).iter().any(|e| matches!(
        &e.payload,
        EventPayload::ScanError { title, .. } if title.starts_with("Duplicate series detected")
    )));
}
