use crate::{
    analysis::traits::{luma, Analyzer, AnalyzerOutput, LuminanceProfile},
    error::Result,
    video::{Frame, VideoMetadata},
};

/// Brightness over time
///
/// Keeps one mean per frame and aggregates them into whole seconds once the
/// frame rate is known.
#[derive(Default)]
pub struct LuminanceAnalyzer {
    frame_means: Vec<(u64, f32)>,
}

impl LuminanceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn mean_luma(frame: &Frame) -> f32 {
        let raw = frame.as_raw();
        let pixels = raw.len() / 3;
        if pixels == 0 {
            return 0.0;
        }
        let sum: u64 = raw.chunks_exact(3).map(|px| luma(px) as u64).sum();
        sum as f32 / pixels as f32 / 255.0
    }
}

impl Analyzer for LuminanceAnalyzer {
    fn name(&self) -> &str {
        "luminance"
    }

    fn description(&self) -> &str {
        "Mean brightness per frame, aggregated per second"
    }

    fn observe(&mut self, frame: &Frame) -> Result<()> {
        self.frame_means.push((frame.index(), Self::mean_luma(frame)));
        Ok(())
    }

    fn finish(&mut self, metadata: &VideoMetadata) -> Result<AnalyzerOutput> {
        let means = std::mem::take(&mut self.frame_means);
        if means.is_empty() {
            return Ok(AnalyzerOutput::Luminance(LuminanceProfile::default()));
        }

        let (mut min, mut max, mut total) = (f32::MAX, f32::MIN, 0.0f32);
        let mut seconds: Vec<(f32, u32)> = Vec::new();

        for &(index, mean) in &means {
            min = min.min(mean);
            max = max.max(mean);
            total += mean;

            let second = metadata.timestamp_of(index).floor() as usize;
            if seconds.len() <= second {
                seconds.resize(second + 1, (0.0, 0));
            }
            seconds[second].0 += mean;
            seconds[second].1 += 1;
        }

        let per_second = seconds
            .into_iter()
            .map(|(sum, n)| if n > 0 { sum / n as f32 } else { 0.0 })
            .collect();

        Ok(AnalyzerOutput::Luminance(LuminanceProfile {
            mean: total / means.len() as f32,
            min,
            max,
            per_second,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_second_profile() {
        let metadata = VideoMetadata {
            width: 4,
            height: 4,
            fps: 2.0,
            codec: "rawvideo".to_string(),
            duration: None,
            frame_count: None,
        };

        let mut analyzer = LuminanceAnalyzer::new();
        analyzer.observe(&Frame::new_filled(0, 4, 4, [0, 0, 0])).unwrap();
        analyzer.observe(&Frame::new_filled(1, 4, 4, [0, 0, 0])).unwrap();
        analyzer.observe(&Frame::new_filled(2, 4, 4, [255, 255, 255])).unwrap();
        analyzer.observe(&Frame::new_filled(3, 4, 4, [255, 255, 255])).unwrap();

        let profile = match analyzer.finish(&metadata).unwrap() {
            AnalyzerOutput::Luminance(profile) => profile,
            other => panic!("unexpected output {:?}", other),
        };

        assert_eq!(profile.per_second.len(), 2);
        assert_eq!(profile.per_second[0], 0.0);
        assert!((profile.per_second[1] - 1.0).abs() < 1e-6);
        assert_eq!(profile.min, 0.0);
        assert!((profile.mean - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_stream() {
        let metadata = VideoMetadata {
            width: 4,
            height: 4,
            fps: 25.0,
            codec: "rawvideo".to_string(),
            duration: None,
            frame_count: Some(0),
        };
        let output = LuminanceAnalyzer::new().finish(&metadata).unwrap();
        assert!(matches!(output, AnalyzerOutput::Luminance(p) if p.per_second.is_empty()));
    }
}
