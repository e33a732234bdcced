//! Database query modules.
//!
//! Every function takes a plain `&Connection` so callers decide the
//! transaction scope: a `rusqlite::Transaction` derefs to `Connection`.

pub mod chapters;
pub mod files;
pub mod genres;
pub mod libraries;
pub mod metadata;
pub mod people;
pub mod recommendations;
pub mod series;
pub mod tags;
pub mod volumes;

use folio_common::{Error, Result};

/// Collect a `query_map` iterator into a `Vec`, mapping row errors.
pub(crate) fn collect_rows<T, I>(rows: I) -> Result<Vec<T>>
where
    I: Iterator<Item = rusqlite::Result<T>>,
{
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))
}
