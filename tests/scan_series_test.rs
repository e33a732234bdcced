//! Single-series rescans and post-commit hooks.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{comic_info, drain, RecordingPrefetcher, TestLibrary};
use folio_common::events::EventPayload;
use folio_common::{Error, SeriesId};

#[tokio::test]
async fn scan_series_picks_up_new_chapters() {
    let lib = TestLibrary::new();
    lib.add_archive("Monster/Monster c001.cbz", 2, None);
    let scanner = lib.scanner();
    scanner.scan_library(lib.library.id, false).await.unwrap();
    let series = lib.series_named("Monster");

    lib.add_archive("Monster/Monster c002.cbz", 3, None);
    let done = scanner.scan_series(series.id, false).await.unwrap().unwrap();

    assert_eq!(done.series_id, series.id);
    assert!(!done.created);
    assert!(done.changed);
    assert_eq!(lib.chapters(series.id).len(), 2);
    assert_eq!(lib.series_named("Monster").pages, 5);
}

#[tokio::test]
async fn scan_series_removes_a_series_without_files() {
    let lib = TestLibrary::new();
    lib.add_archive("Monster/Monster c001.cbz", 2, None);
    lib.add_archive("SeriesB/SeriesB v01.cbz", 2, None);
    let scanner = lib.scanner();
    scanner.scan_library(lib.library.id, false).await.unwrap();
    let series = lib.series_named("Monster");

    lib.remove("Monster/Monster c001.cbz");
    let mut rx = lib.subscribe();
    let done = scanner.scan_series(series.id, false).await.unwrap();

    assert!(done.is_none());
    let names: Vec<String> = lib.series().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["SeriesB"]);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(&e.payload, EventPayload::SeriesRemoved { series_id, .. } if *series_id == series.id)));
}

#[tokio::test]
async fn scan_series_of_unknown_id_is_not_found() {
    let lib = TestLibrary::new();
    let err = lib.scanner().scan_series(SeriesId::new(), false).await.unwrap_err();
    assert_matches!(err, Error::NotFound(_));
}

#[tokio::test]
async fn new_series_are_prefetched_once() {
    let lib = TestLibrary::new();
    lib.add_archive("Monster/Monster c001.cbz", 2, None);
    let prefetcher = Arc::new(RecordingPrefetcher::default());
    let scanner = lib.scanner().with_prefetcher(prefetcher.clone());

    scanner.scan_library(lib.library.id, false).await.unwrap();
    let series = lib.series_named("Monster");
    assert_eq!(prefetcher.calls(), vec![(lib.library.id, series.id)]);

    scanner.scan_library(lib.library.id, true).await.unwrap();
    assert_eq!(prefetcher.calls().len(), 1);
}

#[tokio::test]
async fn covers_are_extracted_after_commit() {
    let lib = TestLibrary::new();
    lib.add_archive("Monster/Monster c001.cbz", 2, None);

    lib.scanner().scan_library(lib.library.id, false).await.unwrap();

    let series = lib.series_named("Monster");
    let cover = series.cover_image.expect("cover recorded");
    assert!(cover.ends_with(&format!("series_{}.jpg", series.id)));
    assert!(std::path::Path::new(&cover).exists());
}

#[tokio::test]
async fn scan_series_covers_every_folder_of_the_series() {
    let lib = TestLibrary::new();
    let info = |volume: &str, number: &str| {
        comic_info(&[("Series", "SeriesC"), ("Volume", volume), ("Number", number)])
    };
    lib.add_archive("SeriesC/SeriesC v01 c001.cbz", 2, Some(&info("1", "1")));
    lib.add_archive("Zextra/SeriesC v02 c005.cbz", 3, Some(&info("2", "5")));
    let scanner = lib.scanner();
    scanner.scan_library(lib.library.id, false).await.unwrap();
    let series = lib.series_named("SeriesC");

    lib.add_archive("Zextra/SeriesC v02 c006.cbz", 4, Some(&info("2", "6")));
    let done = scanner.scan_series(series.id, false).await.unwrap().unwrap();
    assert_eq!(done.series_id, series.id);

    let mut lookups: Vec<String> = lib.volumes(series.id).into_iter().map(|v| v.lookup_name).collect();
    lookups.sort();
    assert_eq!(lookups, vec!["1", "2"]);
    assert_eq!(lib.files(series.id).len(), 3);
    assert_eq!(lib.series_named("SeriesC").pages, 9);
}
