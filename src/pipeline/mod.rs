//! # Segmentation Pipeline
//!
//! Ties decoding, analysis, planning and encoding together for one job.

pub mod engine;
pub mod plan;
mod stream;

pub use engine::{SegmentationEngine, SegmentationOutcome};
pub use plan::{validate_scenario_name, PlannedSegment, SegmentPlan, SegmentPlanner, SegmentRequest};
