//! Geometry Mapper
//!
//! Converts between preview pixels and document points. Previews are
//! always rendered at [`RENDER_SCALE`], so a coordinate picked on a
//! preview maps back to the page with a single division.

use std::sync::Arc;

use serde::Serialize;

use crate::document::{
    DocumentEngine, DocumentError, DocumentResult, EditableDocument, PageSize, RenderedPage,
};

/// Fixed preview scale (pixels per point)
pub const RENDER_SCALE: f32 = 2.0;

/// Preview pixels to document points
pub fn to_document_space(pixels: f32) -> f32 {
    pixels / RENDER_SCALE
}

/// Document points to preview pixels
pub fn to_preview_space(points: f32) -> f32 {
    points * RENDER_SCALE
}

/// Native size of one page, numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub page_num: usize,
    pub width: f32,
    pub height: f32,
}

/// Page geometry and preview rendering over a document engine
pub struct GeometryMapper<E: DocumentEngine> {
    engine: Arc<E>,
}

impl<E: DocumentEngine> Clone for GeometryMapper<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: DocumentEngine> GeometryMapper<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// Native size of every page, in page order
    pub fn page_sizes(&self, data: &[u8]) -> DocumentResult<Vec<PageGeometry>> {
        let doc = self.engine.open(data)?;
        (0..doc.page_count())
            .map(|index| -> DocumentResult<PageGeometry> {
                let size = doc.page_size(index)?;
                Ok(PageGeometry {
                    page_num: index + 1,
                    width: size.width,
                    height: size.height,
                })
            })
            .collect()
    }

    /// Native size of page `page_num` (1-based)
    pub fn get_page_geometry(&self, data: &[u8], page_num: usize) -> DocumentResult<PageSize> {
        let doc = self.engine.open(data)?;
        let page_index = page_index(page_num, doc.page_count())?;
        doc.page_size(page_index)
    }

    /// Render page `page_num` (1-based) at [`RENDER_SCALE`]
    ///
    /// Runs on the blocking pool. Rendering never modifies the document.
    pub async fn render_page(
        &self,
        data: Arc<Vec<u8>>,
        page_num: usize,
    ) -> DocumentResult<RenderedPage> {
        let engine = Arc::clone(&self.engine);

        tokio::task::spawn_blocking(move || {
            let native = {
                let doc = engine.open(&data)?;
                let page_index = page_index(page_num, doc.page_count())?;
                doc.page_size(page_index)?
            };

            let raster = engine.render_page(data, page_num - 1, RENDER_SCALE)?;

            tracing::debug!(
                page = page_num,
                width = raster.width,
                height = raster.height,
                "Rendered page preview"
            );

            Ok(RenderedPage {
                data: raster.data,
                width: raster.width,
                height: raster.height,
                native,
            })
        })
        .await
        .map_err(|e| DocumentError::Storage(format!("Render task failed: {}", e)))?
    }
}

/// Validate a 1-based page number and convert it to an index
pub fn page_index(page_num: usize, page_count: usize) -> DocumentResult<usize> {
    if page_num == 0 || page_num > page_count {
        return Err(DocumentError::InvalidPage {
            page: page_num,
            page_count,
        });
    }
    Ok(page_num - 1)
}
