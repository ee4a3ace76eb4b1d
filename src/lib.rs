//! # Scenario Cutter
//!
//! Upload a video, analyze its frames and export the part that matters for a
//! named scenario as a standalone clip.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scenario_cutter::{
//!     config::Config,
//!     pipeline::{SegmentRequest, SegmentationEngine},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> scenario_cutter::Result<()> {
//! let engine = SegmentationEngine::new(Config::default());
//! let request = SegmentRequest {
//!     scenario: "goal".to_string(),
//!     segment_duration: 5,
//!     emotion_analysis_enabled: false,
//! };
//!
//! let outcome = engine.run("match.mp4", &request, &CancellationToken::new())?;
//! for export in &outcome.exports {
//!     println!("{} -> {:?}", export.name, export.path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame Reader and Segment Writer over ffmpeg pipes
//! - [`analysis`] - Pluggable frame analyzers
//! - [`pipeline`] - Analysis, planning and export for one job
//! - [`server`] - The HTTP upload endpoint
//! - [`config`] - Configuration management
//!
//! ## Custom Analyzers
//!
//! Implement [`Analyzer`](analysis::Analyzer) and register a factory:
//!
//! ```rust,no_run
//! use scenario_cutter::analysis::{Analyzer, AnalyzerOutput, AnalyzerRegistry};
//! use scenario_cutter::video::{Frame, VideoMetadata};
//! use scenario_cutter::Result;
//!
//! struct FrameCounter(u64);
//!
//! impl Analyzer for FrameCounter {
//!     fn name(&self) -> &str {
//!         "frame_counter"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Counts frames"
//!     }
//!
//!     fn observe(&mut self, _frame: &Frame) -> Result<()> {
//!         self.0 += 1;
//!         Ok(())
//!     }
//!
//!     fn finish(&mut self, _metadata: &VideoMetadata) -> Result<AnalyzerOutput> {
//!         Ok(AnalyzerOutput::Events { events: Vec::new() })
//!     }
//! }
//!
//! let mut registry = AnalyzerRegistry::new();
//! registry.register("frame_counter", |_| Box::new(FrameCounter(0)));
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{CutterError, Result},
    pipeline::{SegmentRequest, SegmentationEngine},
    video::{FrameReader, SegmentWriter},
};
