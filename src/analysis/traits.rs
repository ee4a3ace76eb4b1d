use serde::Serialize;

use crate::{
    error::Result,
    video::{Frame, VideoMetadata},
};

/// A frame analyzer
///
/// Analyzers see every decoded frame exactly once, in source order, and
/// summarize what they saw when the stream ends. They never hold on to
/// frames, so memory stays bounded regardless of video length.
pub trait Analyzer: Send {
    /// Returns the unique name of this analyzer
    fn name(&self) -> &str;

    /// Returns a human-readable description of this analyzer
    fn description(&self) -> &str;

    /// Inspect the next frame
    fn observe(&mut self, frame: &Frame) -> Result<()>;

    /// Summarize everything observed
    ///
    /// # Arguments
    ///
    /// * `metadata` - Stream properties, used to turn frame indices into timestamps
    fn finish(&mut self, metadata: &VideoMetadata) -> Result<AnalyzerOutput>;
}

/// Typed result of one analyzer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyzerOutput {
    /// Discrete moments in the video
    Events { events: Vec<DetectedEvent> },

    /// Brightness over time
    Luminance(LuminanceProfile),
}

/// A single detected moment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedEvent {
    pub label: String,
    pub frame_index: u64,
    /// Seconds from the start of the video
    pub timestamp: f64,
    /// Detector-specific strength in 0.0-1.0
    pub score: f32,
}

/// Mean luma statistics, all normalized to 0.0-1.0
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LuminanceProfile {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    /// Average of the frame means within each whole second
    pub per_second: Vec<f32>,
}

/// Rec. 601 luma of an rgb24 pixel, 0-255
#[inline]
pub fn luma(rgb: &[u8]) -> u8 {
    ((77 * rgb[0] as u32 + 150 * rgb[1] as u32 + 29 * rgb[2] as u32) >> 8) as u8
}
