//! Folio - comic and manga library scanner
//!
//! This library crate exposes the scan pipeline for the binary and for
//! integration testing.

pub mod config;
pub mod scanner;
pub mod services;
