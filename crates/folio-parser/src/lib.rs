//! folio-parser: turns library files into structured records.
//!
//! A [`Parser`] maps a file path plus optional embedded `ComicInfo.xml`
//! bytes to a [`ParserInfo`]: series name, volume and chapter tokens,
//! format, special flag. The directory scanner groups records by
//! [`ParsedSeries`] before reconciliation.
//!
//! # Quick start
//!
//! ```
//! use std::path::Path;
//! use folio_common::LibraryType;
//! use folio_parser::{DefaultParser, Parser};
//!
//! let root = Path::new("/library/manga");
//! let info = DefaultParser
//!     .parse(&root.join("SeriesA/SeriesA v01 c002.cbz"), root, LibraryType::Manga, None)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(info.series, "SeriesA");
//! assert_eq!(info.volumes, "1");
//! assert_eq!(info.chapters, "2");
//! ```

pub mod comic_info;
pub mod normalize;
pub mod numbers;
mod parser;
pub mod types;

pub use comic_info::ComicInfo;
pub use parser::{DefaultParser, Parser};
pub use types::{ParsedSeries, ParserInfo};
