//! Format-specific document implementations
//!
//! Each format module implements the `document` traits on top of the
//! lower-level libraries (MuPDF for rasterising, lopdf for editing).

pub mod pdf;
