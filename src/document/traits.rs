//! Document engine traits
//!
//! The rendering and compositing primitives the stamping core relies on.
//! Implementations are synchronous and CPU-bound; async callers run them
//! inside `tokio::task::spawn_blocking`.

use std::sync::Arc;

use super::error::Result;
use super::types::{PageSize, RasterImage, Rect, StampImage};

/// Opens documents and rasterises pages
pub trait DocumentEngine: Send + Sync + 'static {
    /// Open document handle; dropped (and released) on every exit path
    type Document: EditableDocument;

    /// Decode document bytes into an editable handle
    fn open(&self, data: &[u8]) -> Result<Self::Document>;

    /// Rasterise one page (0-based) at a uniform scale
    ///
    /// Must be deterministic: the same bytes, page and scale always give
    /// the same raster.
    fn render_page(&self, data: Arc<Vec<u8>>, page_index: usize, scale: f32) -> Result<RasterImage>;
}

/// An open, mutable document
pub trait EditableDocument: Send {
    fn page_count(&self) -> usize;

    /// Native size of a page (0-based)
    fn page_size(&self, page_index: usize) -> Result<PageSize>;

    /// Draw `image` into `rect` (top-left origin, points), rotated by
    /// `rotation` degrees clockwise about the rectangle centre
    fn draw_image(
        &mut self,
        page_index: usize,
        rect: &Rect,
        rotation: f32,
        image: &StampImage,
    ) -> Result<()>;

    /// Serialise the composited document
    fn save(&mut self) -> Result<Vec<u8>>;
}
