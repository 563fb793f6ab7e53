//! Stamp Placement Engine
//!
//! Turns placement instructions into draws on the target pages:
//!
//! - [`planner`]: target page resolution and per-page placement (pure)
//! - [`jitter`]: bounded random variation, driven by a caller-supplied generator
//! - [`StampEngine`]: loads session artifacts, composites and commits

mod engine;
pub mod jitter;
pub mod planner;
mod types;

pub use engine::StampEngine;
pub use jitter::JitterPolicy;
pub use types::{ApplyMode, ApplyReport, ApplyRequest, Placement, PlacementInstruction};
