use tracing::debug;

use crate::{
    analysis::traits::{luma, Analyzer, AnalyzerOutput, DetectedEvent},
    error::Result,
    video::{Frame, VideoMetadata},
};

const BINS: usize = 32;

/// Pixels sampled per frame; larger frames are strided
const SAMPLE_BUDGET: usize = 64 * 1024;

/// Scene change detection
///
/// Compares normalized luma histograms of consecutive frames. The distance
/// is half the L1 norm of the difference, so identical frames score 0.0 and
/// frames with disjoint brightness score 1.0.
pub struct SceneChangeAnalyzer {
    threshold: f32,
    previous: Option<[f32; BINS]>,
    hits: Vec<(u64, f32)>,
}

impl SceneChangeAnalyzer {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            previous: None,
            hits: Vec::new(),
        }
    }

    fn histogram(frame: &Frame) -> [f32; BINS] {
        let raw = frame.as_raw();
        let pixels = raw.len() / 3;
        let stride = (pixels / SAMPLE_BUDGET).max(1);

        let mut counts = [0u32; BINS];
        let mut sampled = 0u32;
        for px in raw.chunks_exact(3).step_by(stride) {
            counts[luma(px) as usize * BINS / 256] += 1;
            sampled += 1;
        }

        let mut hist = [0f32; BINS];
        if sampled > 0 {
            for (h, c) in hist.iter_mut().zip(counts.iter()) {
                *h = *c as f32 / sampled as f32;
            }
        }
        hist
    }

    fn distance(a: &[f32; BINS], b: &[f32; BINS]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum::<f32>() * 0.5
    }
}

impl Analyzer for SceneChangeAnalyzer {
    fn name(&self) -> &str {
        "scene_change"
    }

    fn description(&self) -> &str {
        "Cuts between shots, from luma histogram jumps"
    }

    fn observe(&mut self, frame: &Frame) -> Result<()> {
        let hist = Self::histogram(frame);
        if let Some(prev) = &self.previous {
            let score = Self::distance(prev, &hist);
            if score >= self.threshold {
                debug!("Scene change at frame {} (distance {:.3})", frame.index(), score);
                self.hits.push((frame.index(), score));
            }
        }
        self.previous = Some(hist);
        Ok(())
    }

    fn finish(&mut self, metadata: &VideoMetadata) -> Result<AnalyzerOutput> {
        let events = self
            .hits
            .drain(..)
            .map(|(frame_index, score)| DetectedEvent {
                label: "scene_change".to_string(),
                frame_index,
                timestamp: metadata.timestamp_of(frame_index),
                score: score.min(1.0),
            })
            .collect();
        self.previous = None;

        Ok(AnalyzerOutput::Events { events })
    }
}
