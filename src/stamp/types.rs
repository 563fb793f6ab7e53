//! Stamp placement types

use serde::{Deserialize, Serialize};

use crate::document::Rect;
use crate::geometry::to_document_space;
use crate::session::SessionId;

/// Which pages an apply request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Only the request's target page
    #[default]
    #[serde(alias = "current_page", alias = "single_page")]
    SinglePage,
    /// Every page of the document
    #[serde(alias = "all_pages")]
    AllPages,
}

/// One stamp's requested overlay, in document points (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementInstruction {
    pub stamp_index: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Degrees, clockwise
    #[serde(default)]
    pub rotation: f32,
}

impl PlacementInstruction {
    pub fn new(stamp_index: u32, rect: Rect, rotation: f32) -> Self {
        Self {
            stamp_index,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            rotation,
        }
    }

    /// Build an instruction from coordinates picked on a rendered preview
    pub fn from_preview_pixels(stamp_index: u32, pixels: Rect, rotation: f32) -> Self {
        Self::new(
            stamp_index,
            Rect::new(
                to_document_space(pixels.x),
                to_document_space(pixels.y),
                to_document_space(pixels.width),
                to_document_space(pixels.height),
            ),
            rotation,
        )
    }

    /// Destination rectangle `(x, y)-(x + width, y + height)`
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// A request to stamp a session's document
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub session_id: SessionId,
    /// Drawn in order; later instructions land on top
    pub instructions: Vec<PlacementInstruction>,
    pub mode: ApplyMode,
    /// 1-based, only read in single-page mode
    pub target_page: usize,
    /// Randomise placements on every page after the first (all-pages only)
    pub jitter: bool,
}

/// A concrete draw resolved for one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// 0-based
    pub page_index: usize,
    pub stamp_index: u32,
    pub rect: Rect,
    pub rotation: f32,
    pub jittered: bool,
}

/// Outcome of an apply call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub session_id: SessionId,
    pub mode: ApplyMode,
    pub pages_processed: usize,
    pub stamps_drawn: usize,
    /// Instructions skipped because their stamp does not exist (per page)
    pub skipped_missing: usize,
    /// Instructions skipped because the stamp could not be composited
    pub draw_failures: usize,
}
