//! PDF format implementation
//!
//! # Architecture
//!
//! - [`PdfDocument`]: lopdf-backed editable document (page boxes, stamp compositing)
//! - `renderer`: MuPDF rasteriser, driven through [`SafeDocument`](crate::mupdf::SafeDocument)
//!
//! [`PdfEngine`] ties the two together behind [`DocumentEngine`]. Both
//! sides measure a page by its displayed box (CropBox within MediaBox,
//! turned by `/Rotate`), so the size used to place a stamp is the size
//! the preview was rendered at.

mod compositor;
mod renderer;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

use crate::document::{DocumentEngine, DocumentResult, RasterImage};

pub use compositor::PdfDocument;

/// PDF document engine
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfEngine;

impl PdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for PdfEngine {
    type Document = PdfDocument;

    fn open(&self, data: &[u8]) -> DocumentResult<PdfDocument> {
        PdfDocument::load(data)
    }

    fn render_page(
        &self,
        data: Arc<Vec<u8>>,
        page_index: usize,
        scale: f32,
    ) -> DocumentResult<RasterImage> {
        renderer::render_page(data, page_index, scale)
    }
}
