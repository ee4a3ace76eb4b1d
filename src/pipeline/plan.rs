use serde::Serialize;
use tracing::debug;

use crate::{
    analysis::AnalysisReport,
    error::{AnalysisError, Result, UploadError},
    video::VideoMetadata,
};

/// Longest accepted scenario name
pub const MAX_SCENARIO_LEN: usize = 64;

/// What the caller asked for
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRequest {
    /// Label used to name the exported file
    pub scenario: String,
    /// Requested segment length in seconds
    pub segment_duration: u32,
    /// Echoed back to the caller
    pub emotion_analysis_enabled: bool,
}

/// Scenario names end up in file names, so keep them to `[A-Za-z0-9_-]`
pub fn validate_scenario_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_SCENARIO_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidScenario { name: name.to_string() }.into())
    }
}

/// One frame range to export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSegment {
    pub name: String,
    pub start_frame: u64,
    /// Exclusive
    pub end_frame: u64,
    /// Event the window was centered on, if any
    pub anchor_frame: Option<u64>,
    pub reason: String,
}

impl PlannedSegment {
    /// A caller-chosen range
    pub fn explicit(name: impl Into<String>, start_frame: u64, end_frame: u64) -> Result<Self> {
        let name = name.into();
        validate_scenario_name(&name)?;
        if start_frame >= end_frame {
            return Err(AnalysisError::InvalidRange {
                details: format!("{}..{} selects no frames", start_frame, end_frame),
            }
            .into());
        }

        Ok(Self {
            name,
            start_frame,
            end_frame,
            anchor_frame: None,
            reason: "explicit range".to_string(),
        })
    }

    pub fn len(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: u64) -> bool {
        (self.start_frame..self.end_frame).contains(&index)
    }

    /// `{name}_segment.{container}`
    pub fn file_name(&self, container: &str) -> String {
        format!("{}_segment.{}", self.name, container)
    }
}

/// Every range one job will export
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentPlan {
    pub segments: Vec<PlannedSegment>,
}

impl SegmentPlan {
    pub fn single(segment: PlannedSegment) -> Self {
        Self {
            segments: vec![segment],
        }
    }

    /// One past the last frame any segment needs
    pub fn frame_limit(&self) -> u64 {
        self.segments.iter().map(|s| s.end_frame).max().unwrap_or(0)
    }
}

/// Chooses which frames become the scenario's segment
pub struct SegmentPlanner;

impl SegmentPlanner {
    /// Center a `segment_duration` window on the strongest detected event
    ///
    /// Without events the window starts at the first frame. The window never
    /// extends past the video; a video without frames yields an empty window.
    pub fn plan(
        request: &SegmentRequest,
        metadata: &VideoMetadata,
        total_frames: u64,
        report: &AnalysisReport,
    ) -> SegmentPlan {
        let wanted = (request.segment_duration as f64 * metadata.fps).round() as u64;
        let window = wanted.max(1).min(total_frames);

        let anchor = report.strongest_event();
        let (start_frame, end_frame) = match anchor {
            Some(event) => centered_window(total_frames, window, event.frame_index),
            None => (0, window),
        };

        let reason = match anchor {
            Some(event) => format!(
                "{} at {:.2}s (score {:.2})",
                event.label, event.timestamp, event.score
            ),
            None => "no events detected; leading frames".to_string(),
        };

        debug!(
            "Planned '{}': frames {}..{} of {} ({})",
            request.scenario, start_frame, end_frame, total_frames, reason
        );

        SegmentPlan::single(PlannedSegment {
            name: request.scenario.clone(),
            start_frame,
            end_frame,
            anchor_frame: anchor.map(|e| e.frame_index),
            reason,
        })
    }
}

/// `[start, end)` of `window` frames around `anchor`, kept inside `0..total`
fn centered_window(total: u64, window: u64, anchor: u64) -> (u64, u64) {
    let window = window.min(total);
    let start = anchor
        .saturating_sub(window / 2)
        .min(total - window);
    (start, start + window)
}
