//! folio-db: database access and persistence layer.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, typed models, and query modules for the catalog:
//! libraries, series and their metadata, volumes, chapters, files, and the
//! globally shared people, genre and tag tables.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
