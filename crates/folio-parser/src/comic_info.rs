//! `ComicInfo.xml` embedded metadata.
//!
//! Every element is read as optional text and interpreted leniently by the
//! accessor methods, so a single malformed number does not reject the whole
//! document.

use chrono::NaiveDate;
use folio_common::{AgeRating, Error, PersonRole, Result};
use serde::Deserialize;

use crate::normalize::split_list;

/// `Format` values that mark a book as a special rather than a numbered issue.
const SPECIAL_FORMATS: &[&str] = &[
    "special",
    "reference",
    "director's cut",
    "box set",
    "boxset",
    "annual",
    "anthology",
    "epilogue",
    "one shot",
    "oneshot",
    "one-shot",
    "prologue",
    "tpb",
    "trade paper back",
    "omnibus",
    "compendium",
    "absolute",
    "graphic novel",
    "gn",
    "fcbd",
    "giant size",
];

/// Embedded comic metadata as found in `ComicInfo.xml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComicInfo {
    #[serde(rename = "Series")]
    pub series: Option<String>,
    #[serde(rename = "LocalizedSeries")]
    pub localized_series: Option<String>,
    #[serde(rename = "SeriesSort")]
    pub series_sort: Option<String>,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: Option<String>,
    #[serde(rename = "Number")]
    pub number: Option<String>,
    #[serde(rename = "Volume")]
    pub volume: Option<String>,
    #[serde(rename = "Count")]
    pub count: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Month")]
    pub month: Option<String>,
    #[serde(rename = "Day")]
    pub day: Option<String>,
    #[serde(rename = "Writer")]
    pub writer: Option<String>,
    #[serde(rename = "Penciller")]
    pub penciller: Option<String>,
    #[serde(rename = "Inker")]
    pub inker: Option<String>,
    #[serde(rename = "Colorist")]
    pub colorist: Option<String>,
    #[serde(rename = "Letterer")]
    pub letterer: Option<String>,
    #[serde(rename = "CoverArtist")]
    pub cover_artist: Option<String>,
    #[serde(rename = "Editor")]
    pub editor: Option<String>,
    #[serde(rename = "Publisher")]
    pub publisher: Option<String>,
    #[serde(rename = "Imprint")]
    pub imprint: Option<String>,
    #[serde(rename = "Translator")]
    pub translator: Option<String>,
    #[serde(rename = "Characters")]
    pub characters: Option<String>,
    #[serde(rename = "Teams")]
    pub teams: Option<String>,
    #[serde(rename = "Locations")]
    pub locations: Option<String>,
    #[serde(rename = "Genre")]
    pub genre: Option<String>,
    #[serde(rename = "Tags")]
    pub tags: Option<String>,
    #[serde(rename = "LanguageISO")]
    pub language_iso: Option<String>,
    #[serde(rename = "AgeRating")]
    pub age_rating: Option<String>,
    #[serde(rename = "GTIN")]
    pub gtin: Option<String>,
    #[serde(rename = "Web")]
    pub web: Option<String>,
    #[serde(rename = "Format")]
    pub format: Option<String>,
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().map(str::trim).unwrap_or("")
}

fn number(field: &Option<String>) -> Option<f64> {
    text(field).replace(',', ".").parse::<f64>().ok()
}

impl ComicInfo {
    /// Parse a `ComicInfo.xml` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml).map_err(|e| Error::parse(format!("ComicInfo.xml: {e}")))
    }

    /// Parse raw embedded bytes (UTF-8, optional BOM).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(bytes)
            .map_err(|e| Error::parse(format!("ComicInfo.xml is not UTF-8: {e}")))?;
        Self::from_xml(xml.trim_start_matches('\u{feff}'))
    }

    pub fn series(&self) -> &str {
        text(&self.series)
    }

    pub fn localized_series(&self) -> &str {
        text(&self.localized_series)
    }

    pub fn series_sort(&self) -> &str {
        text(&self.series_sort)
    }

    pub fn title(&self) -> &str {
        text(&self.title)
    }

    pub fn summary(&self) -> &str {
        text(&self.summary)
    }

    pub fn volume(&self) -> &str {
        text(&self.volume)
    }

    pub fn number(&self) -> &str {
        text(&self.number)
    }

    pub fn language(&self) -> &str {
        text(&self.language_iso)
    }

    pub fn isbn(&self) -> &str {
        text(&self.gtin)
    }

    /// Web links, normalized to a comma separated list without blanks.
    pub fn web_links(&self) -> String {
        split_list(text(&self.web)).join(",")
    }

    /// Declared number of issues in the series; `0` when unknown.
    pub fn total_count(&self) -> i32 {
        number(&self.count).map(|n| n.max(0.0) as i32).unwrap_or(0)
    }

    /// The issue's position used for completion tracking: the chapter
    /// number when positive, else the volume number, else `0`.
    pub fn calculated_count(&self) -> i32 {
        if let Some(n) = number(&self.number).filter(|n| *n > 0.0) {
            return n.floor() as i32;
        }
        if let Some(v) = number(&self.volume).filter(|v| *v > 0.0) {
            return v.floor() as i32;
        }
        0
    }

    /// Publication year; `0` when missing or invalid.
    pub fn year(&self) -> i32 {
        text(&self.year).parse::<i32>().ok().filter(|y| *y > 0).unwrap_or(0)
    }

    /// Release date built from Year/Month/Day, defaulting month and day to 1.
    pub fn release_date(&self) -> Option<NaiveDate> {
        let year = self.year();
        if year == 0 {
            return None;
        }
        let month = text(&self.month).parse::<u32>().ok().filter(|m| (1..=12).contains(m)).unwrap_or(1);
        let day = text(&self.day).parse::<u32>().ok().filter(|d| *d >= 1).unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
    }

    /// Parsed age rating; unknown spellings map to [`AgeRating::Unknown`].
    pub fn age_rating(&self) -> AgeRating {
        let raw = text(&self.age_rating);
        if raw.is_empty() {
            return AgeRating::Unknown;
        }
        raw.parse().unwrap_or(AgeRating::Unknown)
    }

    /// Whether `Format` names a special (annual, one-shot, TPB, ...).
    pub fn is_special_format(&self) -> bool {
        let format = text(&self.format).to_lowercase();
        !format.is_empty() && SPECIAL_FORMATS.contains(&format.as_str())
    }

    pub fn genres(&self) -> Vec<String> {
        split_list(text(&self.genre))
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_list(text(&self.tags))
    }

    /// People credited in one role.
    pub fn people(&self, role: PersonRole) -> Vec<String> {
        let raw = match role {
            PersonRole::Writer => &self.writer,
            PersonRole::Penciller => &self.penciller,
            PersonRole::Inker => &self.inker,
            PersonRole::Colorist => &self.colorist,
            PersonRole::Letterer => &self.letterer,
            PersonRole::CoverArtist => &self.cover_artist,
            PersonRole::Editor => &self.editor,
            PersonRole::Publisher => &self.publisher,
            PersonRole::Imprint => &self.imprint,
            PersonRole::Translator => &self.translator,
            PersonRole::Character => &self.characters,
            PersonRole::Team => &self.teams,
            PersonRole::Location => &self.locations,
            PersonRole::Other => return Vec::new(),
        };
        split_list(text(raw))
    }

    /// Every `(role, name)` credit in the document.
    pub fn all_people(&self) -> Vec<(PersonRole, String)> {
        PersonRole::ALL
            .iter()
            .flat_map(|role| self.people(*role).into_iter().map(move |name| (*role, name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ComicInfo xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Series>SeriesA</Series>
  <LocalizedSeries>Serie A</LocalizedSeries>
  <Number>002</Number>
  <Volume>1</Volume>
  <Count>12</Count>
  <Year>2021</Year>
  <Month>4</Month>
  <Writer>Jane Doe, John Roe</Writer>
  <CoverArtist>Jane Doe</CoverArtist>
  <Genre>Action, Drama</Genre>
  <Tags>Samurai</Tags>
  <AgeRating>Mature 17+</AgeRating>
  <LanguageISO>en</LanguageISO>
  <Web>https://a.example, https://b.example</Web>
  <Pages>
    <Page Image="0" Type="FrontCover" />
  </Pages>
</ComicInfo>"#;

    #[test]
    fn parses_sample_document() {
        let info = ComicInfo::from_xml(SAMPLE).unwrap();
        assert_eq!(info.series(), "SeriesA");
        assert_eq!(info.localized_series(), "Serie A");
        assert_eq!(info.volume(), "1");
        assert_eq!(info.total_count(), 12);
        assert_eq!(info.calculated_count(), 2);
        assert_eq!(info.age_rating(), AgeRating::Mature17Plus);
        assert_eq!(info.language(), "en");
        assert_eq!(info.genres(), vec!["Action", "Drama"]);
        assert_eq!(info.tag_list(), vec!["Samurai"]);
        assert_eq!(info.web_links(), "https://a.example,https://b.example");
        assert_eq!(info.release_date(), NaiveDate::from_ymd_opt(2021, 4, 1));
    }

    #[test]
    fn people_by_role() {
        let info = ComicInfo::from_xml(SAMPLE).unwrap();
        assert_eq!(info.people(PersonRole::Writer), vec!["Jane Doe", "John Roe"]);
        let all = info.all_people();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&(PersonRole::CoverArtist, "Jane Doe".to_string())));
    }

    #[test]
    fn lenient_numbers() {
        let info = ComicInfo {
            number: Some("abc".into()),
            volume: Some("3".into()),
            count: Some("".into()),
            year: Some("-1".into()),
            ..Default::default()
        };
        assert_eq!(info.calculated_count(), 3);
        assert_eq!(info.total_count(), 0);
        assert_eq!(info.year(), 0);
        assert!(info.release_date().is_none());
    }

    #[test]
    fn special_formats() {
        let annual = ComicInfo {
            format: Some("Annual".into()),
            ..Default::default()
        };
        assert!(annual.is_special_format());
        assert!(!ComicInfo::default().is_special_format());
    }

    #[test]
    fn bytes_with_bom() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(b"<ComicInfo><Series>X</Series></ComicInfo>");
        assert_eq!(ComicInfo::from_bytes(&bytes).unwrap().series(), "X");
        assert!(ComicInfo::from_bytes(b"<ComicInfo><Series>").is_err());
    }
}
