//! Placement planning
//!
//! Pure functions turning an apply request into the list of concrete
//! draws. No document or storage access happens here.

use std::collections::HashSet;

use rand::Rng;

use super::jitter::JitterPolicy;
use super::types::{ApplyMode, Placement, PlacementInstruction};
use crate::document::DocumentResult;
use crate::geometry::page_index;

/// Draws for one apply call, in drawing order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementPlan {
    pub placements: Vec<Placement>,
    /// Instructions dropped because their stamp is unavailable, per page
    pub skipped_missing: usize,
}

/// 0-based page indices an apply call touches
pub fn resolve_target_pages(
    mode: ApplyMode,
    target_page: usize,
    page_count: usize,
) -> DocumentResult<Vec<usize>> {
    match mode {
        ApplyMode::SinglePage => Ok(vec![page_index(target_page, page_count)?]),
        ApplyMode::AllPages => Ok((0..page_count).collect()),
    }
}

/// Expand instructions over the target pages
///
/// Pages are visited in order and instructions in submission order. The
/// first target page is always placed exactly as requested; later pages
/// get an independent jitter sample per instruction when the mode is
/// all-pages and `jitter` is set.
pub fn plan_placements<R: Rng + ?Sized>(
    pages: &[usize],
    instructions: &[PlacementInstruction],
    available: &HashSet<u32>,
    mode: ApplyMode,
    jitter: bool,
    policy: &JitterPolicy,
    rng: &mut R,
) -> PlacementPlan {
    let mut plan = PlacementPlan::default();

    for (position, &page_index) in pages.iter().enumerate() {
        let jittered = mode == ApplyMode::AllPages && jitter && position > 0;

        for instruction in instructions {
            if !available.contains(&instruction.stamp_index) {
                plan.skipped_missing += 1;
                continue;
            }

            let mut rect = instruction.rect();
            let mut rotation = instruction.rotation;
            if jittered {
                let sample = policy.sample(rng);
                rect = rect.translated(sample.dx, sample.dy);
                rotation += sample.rotation;
            }

            plan.placements.push(Placement {
                page_index,
                stamp_index: instruction.stamp_index,
                rect,
                rotation,
                jittered,
            });
        }
    }

    plan
}
