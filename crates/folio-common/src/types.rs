//! Core type definitions for libraries, files, and series metadata.
//!
//! Enums are stored in SQLite as lowercase text (see `as_str`) and parsed back
//! with `FromStr`. Parsing is lenient about case, spaces and separators so the
//! same impls accept values coming from embedded metadata and config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Lowercase and drop everything that is not alphanumeric or `+`.
fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '+')
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            /// Canonical text used for storage and display.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let folded = fold(s);
                $(
                    if folded == fold($text) $(|| folded == fold($alias))* {
                        return Ok(Self::$variant);
                    }
                )+
                Err(Error::invalid_input(format!(
                    concat!("unknown ", stringify!($name), ": {}"),
                    s
                )))
            }
        }
    };
}

/// Kind of content a library holds; drives parser behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    /// Japanese-style manga, volume/chapter numbered.
    Manga,
    /// Western comics, issue numbered.
    Comic,
    /// Prose books (epub/pdf).
    Book,
    /// Light novels.
    LightNovel,
    /// Loose image folders.
    Image,
}

text_enum!(LibraryType {
    Manga => "manga",
    Comic => "comic",
    Book => "book",
    LightNovel => "lightnovel",
    Image => "image",
});

/// Physical format of a file, and by extension of the series built from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MangaFormat {
    /// A single image file.
    Image,
    /// A zip/rar/7z comic archive.
    Archive,
    /// An EPUB book.
    Epub,
    /// A PDF document.
    Pdf,
    /// Anything else.
    Unknown,
}

text_enum!(MangaFormat {
    Image => "image",
    Archive => "archive",
    Epub => "epub",
    Pdf => "pdf",
    Unknown => "unknown",
});

impl MangaFormat {
    /// Formats that represent a whole book in one file.
    pub fn is_single_file_book(&self) -> bool {
        matches!(self, Self::Epub | Self::Pdf)
    }
}

/// Content rating. Declaration order is severity order, so `max()` picks the
/// most restrictive rating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum AgeRating {
    NotApplicable,
    #[default]
    Unknown,
    RatingPending,
    EarlyChildhood,
    Everyone,
    G,
    Everyone10Plus,
    Pg,
    KidsToAdults,
    Teen,
    Mature15Plus,
    Mature17Plus,
    Mature,
    R18Plus,
    AdultsOnly,
    X18Plus,
}

text_enum!(AgeRating {
    NotApplicable => "not applicable" | "n/a",
    Unknown => "unknown",
    RatingPending => "rating pending",
    EarlyChildhood => "early childhood",
    Everyone => "everyone",
    G => "g",
    Everyone10Plus => "everyone 10+",
    Pg => "pg",
    KidsToAdults => "kids to adults",
    Teen => "teen",
    Mature15Plus => "ma15+",
    Mature17Plus => "mature 17+",
    Mature => "m" | "mature",
    R18Plus => "r18+",
    AdultsOnly => "adults only 18+" | "adults only",
    X18Plus => "x18+",
});

/// Publication state of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    OnGoing,
    Hiatus,
    Completed,
    Cancelled,
    Ended,
}

text_enum!(PublicationStatus {
    OnGoing => "ongoing",
    Hiatus => "hiatus",
    Completed => "completed",
    Cancelled => "cancelled",
    Ended => "ended",
});

/// Role a person plays on a chapter or series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Writer,
    Penciller,
    Inker,
    Colorist,
    Letterer,
    CoverArtist,
    Editor,
    Publisher,
    Imprint,
    Translator,
    Character,
    Team,
    Location,
    Other,
}

text_enum!(PersonRole {
    Writer => "writer",
    Penciller => "penciller",
    Inker => "inker",
    Colorist => "colorist",
    Letterer => "letterer",
    CoverArtist => "coverartist" | "cover artist",
    Editor => "editor",
    Publisher => "publisher",
    Imprint => "imprint",
    Translator => "translator",
    Character => "character",
    Team => "team",
    Location => "location",
    Other => "other",
});

impl PersonRole {
    /// Every role, in a stable order.
    pub const ALL: [PersonRole; 14] = [
        PersonRole::Writer,
        PersonRole::Penciller,
        PersonRole::Inker,
        PersonRole::Colorist,
        PersonRole::Letterer,
        PersonRole::CoverArtist,
        PersonRole::Editor,
        PersonRole::Publisher,
        PersonRole::Imprint,
        PersonRole::Translator,
        PersonRole::Character,
        PersonRole::Team,
        PersonRole::Location,
        PersonRole::Other,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_rating_order_is_severity() {
        assert!(AgeRating::Mature > AgeRating::Teen);
        assert!(AgeRating::Unknown > AgeRating::NotApplicable);
        let max = [AgeRating::Everyone, AgeRating::R18Plus, AgeRating::Teen]
            .into_iter()
            .max();
        assert_eq!(max, Some(AgeRating::R18Plus));
    }

    #[test]
    fn age_rating_parses_comic_info_spellings() {
        assert_eq!("Mature 17+".parse::<AgeRating>().unwrap(), AgeRating::Mature17Plus);
        assert_eq!("Adults Only 18+".parse::<AgeRating>().unwrap(), AgeRating::AdultsOnly);
        assert_eq!("M".parse::<AgeRating>().unwrap(), AgeRating::Mature);
        assert_eq!("Everyone 10+".parse::<AgeRating>().unwrap(), AgeRating::Everyone10Plus);
        assert!("PG-13ish".parse::<AgeRating>().is_err());
    }

    #[test]
    fn storage_text_roundtrips() {
        for role in PersonRole::ALL {
            assert_eq!(role.as_str().parse::<PersonRole>().unwrap(), role);
        }
        for status in [
            PublicationStatus::OnGoing,
            PublicationStatus::Hiatus,
            PublicationStatus::Completed,
            PublicationStatus::Cancelled,
            PublicationStatus::Ended,
        ] {
            assert_eq!(status.to_string().parse::<PublicationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn role_parse_is_lenient() {
        assert_eq!("Cover Artist".parse::<PersonRole>().unwrap(), PersonRole::CoverArtist);
        assert_eq!("WRITER".parse::<PersonRole>().unwrap(), PersonRole::Writer);
    }

    #[test]
    fn single_file_books() {
        assert!(MangaFormat::Epub.is_single_file_book());
        assert!(MangaFormat::Pdf.is_single_file_book());
        assert!(!MangaFormat::Archive.is_single_file_book());
    }
}
