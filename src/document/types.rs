//! Core document types
//!
//! Engine-agnostic types shared by geometry, stamping and the PDF collaborator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
}

impl DocumentFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Detect format from magic bytes
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PDF magic: %PDF
        if bytes.starts_with(b"%PDF") {
            return Some(Self::Pdf);
        }

        None
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
        }
    }
}

/// Native page size in document units (points, 72 per inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of this page rendered at `scale`
    pub fn pixel_dimensions(&self, scale: f32) -> (u32, u32) {
        (
            (self.width * scale).round() as u32,
            (self.height * scale).round() as u32,
        )
    }
}

/// Rectangle with a top-left origin (y grows downwards)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Same size, moved by `(dx, dy)`
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Encoded raster produced by a document engine
#[derive(Debug, Clone)]
pub struct RasterImage {
    /// PNG bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A page rendered for preview, together with the geometry it came from
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// PNG bytes
    pub data: Vec<u8>,
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
    /// Native page size in points
    pub native: PageSize,
}

impl RenderedPage {
    pub fn content_type(&self) -> &'static str {
        "image/png"
    }
}

/// Stamp bytes handed to the engine for drawing
#[derive(Debug, Clone)]
pub struct StampImage {
    /// Session-unique stamp index
    pub index: u32,
    /// Encoded image (PNG or JPEG)
    pub data: Arc<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_dimensions_round() {
        let size = PageSize::new(600.0, 800.0);
        assert_eq!(size.pixel_dimensions(2.0), (1200, 1600));

        let odd = PageSize::new(595.3, 841.9);
        assert_eq!(odd.pixel_dimensions(2.0), (1191, 1684));
    }

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(50.0, 50.0, 100.0, 40.0);
        assert_eq!(rect.right(), 150.0);
        assert_eq!(rect.bottom(), 90.0);
        assert_eq!(rect.center(), (100.0, 70.0));
        assert_eq!(Rect::from_ltrb(50.0, 50.0, 150.0, 90.0), rect);
    }

    #[test]
    fn test_rect_translated_keeps_size() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0).translated(-2.5, 4.0);
        assert_eq!(rect, Rect::new(7.5, 24.0, 30.0, 40.0));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("epub"), None);
        assert_eq!(
            DocumentFormat::from_magic_bytes(b"%PDF-1.7\n"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_magic_bytes(b"PK\x03\x04"), None);
    }
}
