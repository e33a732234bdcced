//! Folio-Common: shared types, errors, and utilities.
//!
//! This crate provides common functionality used across folio:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for libraries, series, volumes, etc.
//! - **Core Types**: Enums for file formats, age ratings, publication status and person roles
//! - **Path Utilities**: Functions to classify files by extension
//! - **Error Handling**: Common error type and result alias
//! - **Events**: The broadcast bus scan notifications are published on
//!
//! # Examples
//!
//! ```
//! use folio_common::{SeriesId, MangaFormat, Error, Result};
//! use folio_common::paths::format_for_path;
//! use std::path::Path;
//!
//! let series_id = SeriesId::new();
//! assert_eq!(format_for_path(Path::new("Vol 01.cbz")), Some(MangaFormat::Archive));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("series"))
//! }
//! ```

pub mod error;
pub mod events;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
