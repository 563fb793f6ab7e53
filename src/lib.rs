//! PDF Stamp Server Library
//!
//! Overlays raster stamp images onto document pages. The binary in
//! `main.rs` serves this over HTTP; the library is also used by the
//! benchmarks.
//!
//! # Modules
//!
//! - `session`: Session Resource Store (documents, stamps, results)
//! - `geometry`: preview pixel <-> document point mapping, page rendering
//! - `stamp`: placement planning, jitter and compositing orchestration
//! - `export`: access to stamped results
//! - `document` / `formats`: engine-agnostic traits and the PDF engine

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod formats;
pub mod geometry;
pub mod routes;
pub mod session;
pub mod stamp;
pub mod state;

// Internal modules that formats depends on
mod mupdf;
