use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    analysis::{AnalysisReport, AnalysisSession, AnalyzerRegistry},
    config::Config,
    error::{Result, VideoError},
    pipeline::{
        stream::pump_frames, PlannedSegment, SegmentPlan, SegmentPlanner,
        SegmentRequest,
    },
    video::{ExportedSegment, FfmpegTools, FrameReader, SegmentEncoder, SegmentWriter, VideoMetadata},
};

/// Everything one segmentation job produced
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationOutcome {
    pub metadata: VideoMetadata,
    pub frames_decoded: u64,
    pub report: AnalysisReport,
    pub plan: SegmentPlan,
    pub exports: Vec<ExportedSegment>,
}

/// Drives one uploaded asset from decoding to exported segments
///
/// The pipeline has three steps:
/// 1. Analysis - stream every frame through the configured analyzers
/// 2. Planning - pick the frame window for the scenario
/// 3. Export - decode again and encode only the planned frames
///
/// Frames are never held in memory beyond the bounded decode channel.
pub struct SegmentationEngine {
    config: Config,
    reader: FrameReader,
    writer: SegmentWriter,
    registry: AnalyzerRegistry,
}

impl SegmentationEngine {
    /// Create an engine with the built-in analyzers
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, AnalyzerRegistry::new())
    }

    pub fn with_registry(config: Config, registry: AnalyzerRegistry) -> Self {
        let tools = FfmpegTools::from_config(&config.video);
        Self {
            reader: FrameReader::new(tools.clone()),
            writer: SegmentWriter::new(tools, config.video.params.clone()),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reader(&self) -> &FrameReader {
        &self.reader
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    /// Analyze `source`, plan the scenario's segment and export it
    pub fn run<P: AsRef<Path>>(
        &self,
        source: P,
        request: &SegmentRequest,
        cancel: &CancellationToken,
    ) -> Result<SegmentationOutcome> {
        let source = source.as_ref();

        info!("🎬 Segmenting {:?} for scenario '{}'", source, request.scenario);
        info!("   Segment duration: {}s", request.segment_duration);
        debug!("   Emotion analysis flag: {}", request.emotion_analysis_enabled);

        // Pipeline Step 1: Analysis
        let (metadata, report) = self.analyze(source, cancel)?;

        // Pipeline Step 2: Planning
        info!("🗺️  Step 2: Planning segment...");
        let plan = SegmentPlanner::plan(request, &metadata, report.frames_analyzed, &report);
        for segment in &plan.segments {
            info!(
                "   '{}': frames {}..{} ({})",
                segment.name, segment.start_frame, segment.end_frame, segment.reason
            );
        }

        // Pipeline Step 3: Export
        let exports = self.export(source, &plan, cancel)?;

        info!("🎉 Segmentation complete: {} segment(s) exported", exports.len());
        Ok(SegmentationOutcome {
            frames_decoded: report.frames_analyzed,
            metadata,
            report,
            plan,
            exports,
        })
    }

    /// Stream all frames of `source` through the configured analyzers
    pub fn analyze<P: AsRef<Path>>(
        &self,
        source: P,
        cancel: &CancellationToken,
    ) -> Result<(VideoMetadata, AnalysisReport)> {
        info!("🔍 Step 1: Analyzing frames...");

        let analysis = &self.config.analysis;
        let mut session = AnalysisSession::new(self.registry.build(&analysis.analyzers, analysis)?);

        let stream = self.reader.open(source)?;
        let metadata = stream.metadata().clone();
        info!(
            "   Source: {}x{} @ {:.2}fps ({})",
            metadata.width, metadata.height, metadata.fps, metadata.codec
        );

        pump_frames(stream, self.config.video.channel_capacity, None, cancel, |frame| {
            session.observe(&frame)
        })?;

        let report = session.finish(&metadata)?;
        info!("   ✅ Analyzed {} frames, {} event(s)", report.frames_analyzed, report.events().len());
        if report.frames_analyzed == 0 {
            warn!("Source contains no decodable frames");
        }

        Ok((metadata, report))
    }

    /// Encode every planned segment in a single decoding pass
    ///
    /// Each segment lands at `{output_dir}/{name}_segment.{container}`.
    /// Concurrent jobs for the same scenario share that path: the file is
    /// always whole, but it holds the last job to finish, so the returned
    /// [`ExportedSegment`] may describe a file that was since replaced.
    pub fn export<P: AsRef<Path>>(
        &self,
        source: P,
        plan: &SegmentPlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExportedSegment>> {
        info!("💾 Step 3: Exporting {} segment(s)...", plan.segments.len());

        let source = source.as_ref();
        let output_dir = &self.config.storage.output_dir;
        std::fs::create_dir_all(output_dir)?;

        let mut pending: Vec<(&PlannedSegment, Option<SegmentEncoder>)> =
            plan.segments.iter().map(|segment| (segment, None)).collect();

        let limit = plan.frame_limit();
        if limit > 0 {
            let container = &self.config.video.params.container;
            let stream = self.reader.open(source)?;
            pump_frames(stream, self.config.video.channel_capacity, Some(limit), cancel, |frame| {
                for (segment, encoder) in pending.iter_mut() {
                    if !segment.contains(frame.index()) {
                        continue;
                    }
                    if encoder.is_none() {
                        let output = output_dir.join(segment.file_name(container));
                        debug!("Starting encoder for '{}' at {}", segment.name, output.display());
                        *encoder = Some(self.writer.begin(
                            &segment.name,
                            output,
                            frame.width(),
                            frame.height(),
                        )?);
                    }
                    if let Some(encoder) = encoder.as_mut() {
                        encoder.push(&frame)?;
                    }
                }
                Ok(())
            })?;
        }

        let mut exports = Vec::with_capacity(pending.len());
        for (segment, encoder) in pending {
            match encoder {
                Some(encoder) => exports.push(encoder.finish()?),
                None => {
                    return Err(VideoError::EmptySegment {
                        name: segment.name.clone(),
                    }
                    .into())
                }
            }
        }

        Ok(exports)
    }
}
