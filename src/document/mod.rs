//! Engine-agnostic document abstraction
//!
//! The stamping core talks to documents only through these traits and
//! types, so the PDF collaborator can be swapped for a recording fake in
//! tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │  GeometryMapper  │    │   StampEngine    │
//! └────────┬─────────┘    └────────┬─────────┘
//!          │  render_page          │  open / draw_image / save
//!          └───────────┬───────────┘
//!                      ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │                 DocumentEngine                      │
//!   │   (PdfEngine: MuPDF rasteriser + lopdf compositor)  │
//!   └─────────────────────────────────────────────────────┘
//! ```

mod error;
mod traits;
mod types;

pub use error::{DocumentError, DocumentResult, Result};
pub use traits::{DocumentEngine, EditableDocument};
pub use types::{DocumentFormat, PageSize, RasterImage, Rect, RenderedPage, StampImage};
