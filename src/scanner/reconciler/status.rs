//! Total/max counts and publication status.

use folio_common::{Error, MangaFormat, PublicationStatus, Result};
use folio_db::models::{Chapter, Volume};
use folio_parser::numbers::{is_loose_leaf_volume, is_special_volume};

/// Counts declared by a series' chapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesCounts {
    pub total_count: i32,
    pub max_count: i32,
}

fn whole(value: f64) -> Result<i32> {
    if !value.is_finite() || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(Error::internal(format!("count out of range: {value}")));
    }
    Ok(value.floor() as i32)
}

/// Derive the declared total and the highest count reached.
///
/// `TotalCount` is the largest declared total. `MaxCount` is the largest
/// declared count of a regular chapter, or the highest numbered regular
/// volume when that is larger. A single-file book with one chapter always
/// counts as one; a lone special with no real total counts as complete.
pub fn derive_counts(format: MangaFormat, volumes: &[Volume], chapters: &[Chapter]) -> Result<SeriesCounts> {
    let mut total_count = chapters.iter().map(|c| c.total_count).max().unwrap_or(0).max(0);

    let mut max_count = chapters
        .iter()
        .filter(|c| !c.is_special)
        .map(|c| c.count)
        .max()
        .unwrap_or(0);
    for volume in volumes {
        if is_loose_leaf_volume(&volume.lookup_name) || is_special_volume(&volume.lookup_name) {
            continue;
        }
        let has_regular_chapter = chapters
            .iter()
            .any(|c| c.volume_id == volume.id && !c.is_special);
        if has_regular_chapter && total_count > 0 {
            max_count = max_count.max(whole(volume.number)?);
        }
    }

    if format.is_single_file_book() && chapters.len() == 1 {
        max_count = 1;
    } else if total_count <= 1 && chapters.len() == 1 && chapters[0].is_special {
        total_count = 1;
        max_count = 1;
    }

    Ok(SeriesCounts {
        total_count,
        max_count: max_count.max(0),
    })
}

/// Completed when the declared total was reached, Ended when both counts
/// are known but differ, otherwise OnGoing.
pub fn derive_status(counts: SeriesCounts) -> PublicationStatus {
    if counts.total_count > 0 && counts.max_count == counts.total_count {
        PublicationStatus::Completed
    } else if counts.total_count > 0 && counts.max_count > 0 {
        PublicationStatus::Ended
    } else {
        PublicationStatus::OnGoing
    }
}
