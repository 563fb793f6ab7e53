//! PDF page rasteriser
//!
//! Uses MuPDF for page rendering and the `image` crate for PNG encoding.

use std::io::Cursor;
use std::sync::Arc;

use image::{imageops::FilterType, DynamicImage, RgbaImage};
use mupdf::{Colorspace, Matrix};

use crate::document::{DocumentError, DocumentResult, PageSize, RasterImage};
use crate::mupdf::SafeDocument;

/// Render one page (0-based) to a PNG at a uniform `scale`
///
/// The page box comes from MuPDF, so CropBox and `/Rotate` are already
/// applied and both axes share the one scale factor. The raster is
/// exactly `round(width * scale)` x `round(height * scale)` pixels; MuPDF
/// rounds the device box outwards, so an extra edge pixel is resampled
/// away when that happens.
pub fn render_page(data: Arc<Vec<u8>>, page_index: usize, scale: f32) -> DocumentResult<RasterImage> {
    let doc = SafeDocument::from_bytes(data)?;

    let (rgba, width, height) = doc.with_page(page_index, |page| {
        let bounds = page.bounds()?;
        let size = PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0);
        if size.width <= 0.0 || size.height <= 0.0 {
            return Err(DocumentError::DecodeFailure(format!(
                "page {} has an empty bounding box",
                page_index + 1
            )));
        }

        let (width, height) = size.pixel_dimensions(scale);
        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

        Ok((pixmap_to_rgba(&pixmap)?, width.max(1), height.max(1)))
    })?;

    let rgba = if rgba.dimensions() == (width, height) {
        rgba
    } else {
        tracing::debug!(
            page = page_index + 1,
            rendered_width = rgba.width(),
            rendered_height = rgba.height(),
            width,
            height,
            "Trimming rendered page to target size"
        );
        image::imageops::resize(&rgba, width, height, FilterType::Triangle)
    };

    let data = encode_png(rgba)?;

    Ok(RasterImage {
        data,
        width,
        height,
    })
}

fn pixmap_to_rgba(pixmap: &mupdf::Pixmap) -> DocumentResult<RgbaImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba_buffer = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba_buffer.extend_from_slice(&[r, g, b, a]);
        }
    }

    RgbaImage::from_raw(width, height, rgba_buffer)
        .ok_or_else(|| DocumentError::DecodeFailure("Failed to create image buffer".to_string()))
}

fn encode_png(rgba: RgbaImage) -> DocumentResult<Vec<u8>> {
    let mut output = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| DocumentError::DecodeFailure(e.to_string()))?;
    Ok(output)
}
