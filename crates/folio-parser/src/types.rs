//! Parsed file records and the series grouping key.

use folio_common::MangaFormat;

use crate::comic_info::ComicInfo;
use crate::normalize::normalize;
use crate::numbers::{self, SPECIAL_VOLUME};

/// Everything parsed from one file: its path, name tokens and optional
/// embedded metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserInfo {
    pub series: String,
    /// Sort name override; empty when the file does not provide one.
    pub series_sort: String,
    pub localized_series: String,
    /// Raw volume token. This is the volume's identity (`LookupName`).
    pub volumes: String,
    /// Raw chapter token, a number or a range such as `"1-5"`.
    pub chapters: String,
    /// File name including extension.
    pub filename: String,
    pub full_file_path: String,
    pub format: MangaFormat,
    pub title: String,
    pub is_special: bool,
    pub comic_info: Option<ComicInfo>,
}

impl ParserInfo {
    /// Whether this file is a special, either by name or by its volume token.
    pub fn is_special_info(&self) -> bool {
        self.is_special || self.volumes == SPECIAL_VOLUME
    }

    pub fn min_number(&self) -> f64 {
        numbers::min_number_from_range(&self.chapters)
    }

    pub fn max_number(&self) -> f64 {
        numbers::max_number_from_range(&self.chapters)
    }

    /// The grouping key for this file.
    pub fn series_key(&self) -> ParsedSeries {
        ParsedSeries::new(&self.series, self.format)
    }
}

/// Grouping key for files of one series: normalized name plus format.
///
/// The display name is carried along but does not take part in equality.
#[derive(Debug, Clone)]
pub struct ParsedSeries {
    pub name: String,
    pub normalized_name: String,
    pub format: MangaFormat,
}

impl ParsedSeries {
    pub fn new(name: &str, format: MangaFormat) -> Self {
        Self {
            name: name.to_string(),
            normalized_name: normalize(name),
            format,
        }
    }
}

impl PartialEq for ParsedSeries {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_name == other.normalized_name && self.format == other.format
    }
}

impl Eq for ParsedSeries {}

impl std::hash::Hash for ParsedSeries {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized_name.hash(state);
        self.format.hash(state);
    }
}

impl PartialOrd for ParsedSeries {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedSeries {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.normalized_name, self.format).cmp(&(&other.normalized_name, other.format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_equality_ignores_display_name() {
        let a = ParsedSeries::new("Attack on Titan", MangaFormat::Archive);
        let b = ParsedSeries::new("attack on titan", MangaFormat::Archive);
        let c = ParsedSeries::new("Attack on Titan", MangaFormat::Epub);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
