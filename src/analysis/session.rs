use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::{
    analysis::{Analyzer, AnalyzerOutput, DetectedEvent},
    error::{AnalysisError, Result},
    video::{Frame, FrameSequence, VideoMetadata},
};

/// A set of analyzers fed from one frame stream
pub struct AnalysisSession {
    analyzers: Vec<Box<dyn Analyzer>>,
    frames_observed: u64,
}

impl AnalysisSession {
    pub fn new(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self {
            analyzers,
            frames_observed: 0,
        }
    }

    /// Hand one frame to every analyzer, in parallel
    pub fn observe(&mut self, frame: &Frame) -> Result<()> {
        self.analyzers.par_iter_mut().try_for_each(|analyzer| -> Result<()> {
            analyzer.observe(frame).map_err(|e| {
                AnalysisError::Failed {
                    analyzer: analyzer.name().to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
        })?;
        self.frames_observed += 1;
        Ok(())
    }

    /// Collect every analyzer's output
    pub fn finish(mut self, metadata: &VideoMetadata) -> Result<AnalysisReport> {
        let mut outputs = BTreeMap::new();
        for analyzer in self.analyzers.iter_mut() {
            let output = analyzer.finish(metadata)?;
            debug!("Analyzer {} finished", analyzer.name());
            outputs.insert(analyzer.name().to_string(), output);
        }

        Ok(AnalysisReport {
            frames_analyzed: self.frames_observed,
            outputs,
        })
    }

    /// Run over an already decoded sequence
    pub fn analyze_sequence(mut self, sequence: &FrameSequence) -> Result<AnalysisReport> {
        for frame in sequence.iter() {
            self.observe(frame)?;
        }
        self.finish(sequence.metadata())
    }
}

/// Everything the analyzers of one job produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub frames_analyzed: u64,
    pub outputs: BTreeMap<String, AnalyzerOutput>,
}

impl AnalysisReport {
    /// All detected events across analyzers, ordered by frame
    pub fn events(&self) -> Vec<&DetectedEvent> {
        let mut events: Vec<&DetectedEvent> = self
            .outputs
            .values()
            .filter_map(|output| match output {
                AnalyzerOutput::Events { events } => Some(events.iter()),
                _ => None,
            })
            .flatten()
            .collect();
        events.sort_by_key(|e| e.frame_index);
        events
    }

    /// The highest-scoring event; ties go to the earliest
    pub fn strongest_event(&self) -> Option<&DetectedEvent> {
        self.events()
            .into_iter()
            .fold(None, |best: Option<&DetectedEvent>, e| match best {
                Some(b) if b.score >= e.score => Some(b),
                _ => Some(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LuminanceAnalyzer, SceneChangeAnalyzer};

    fn sequence(colors: &[[u8; 3]]) -> FrameSequence {
        let metadata = VideoMetadata {
            width: 8,
            height: 8,
            fps: 5.0,
            codec: "rawvideo".to_string(),
            duration: None,
            frame_count: Some(colors.len() as u64),
        };
        let frames = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| Frame::new_filled(i as u64, 8, 8, c))
            .collect();
        FrameSequence::new(metadata, frames)
    }

    #[test]
    fn test_session_collects_all_outputs() {
        let seq = sequence(&[[0, 0, 0], [0, 0, 0], [255, 255, 255], [255, 255, 255]]);
        let session = AnalysisSession::new(vec![
            Box::new(SceneChangeAnalyzer::new(0.35)),
            Box::new(LuminanceAnalyzer::new()),
        ]);

        let report = session.analyze_sequence(&seq).unwrap();
        assert_eq!(report.frames_analyzed, 4);
        assert!(report.outputs.contains_key("scene_change"));
        assert!(report.outputs.contains_key("luminance"));

        let strongest = report.strongest_event().unwrap();
        assert_eq!(strongest.frame_index, 2);
    }

    #[test]
    fn test_strongest_prefers_earliest_tie() {
        let event = |frame_index, score| DetectedEvent {
            label: "scene_change".to_string(),
            frame_index,
            timestamp: 0.0,
            score,
        };
        let mut report = AnalysisReport::default();
        report.outputs.insert(
            "scene_change".to_string(),
            AnalyzerOutput::Events {
                events: vec![event(9, 0.8), event(4, 0.8), event(6, 0.5)],
            },
        );

        assert_eq!(report.strongest_event().unwrap().frame_index, 4);
        let order: Vec<u64> = report.events().iter().map(|e| e.frame_index).collect();
        assert_eq!(order, vec![4, 6, 9]);
    }

    #[test]
    fn test_no_events() {
        let report = AnalysisSession::new(vec![]).analyze_sequence(&sequence(&[])).unwrap();
        assert!(report.strongest_event().is_none());
        assert_eq!(report.frames_analyzed, 0);
    }
}
