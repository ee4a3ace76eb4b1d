use std::collections::BTreeMap;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    analysis::{AnalyzerOutput, DetectedEvent},
    config::StorageConfig,
    error::CutterError,
    pipeline::{SegmentRequest, SegmentationOutcome},
    server::{error::ApiError, upload::parse_upload, AppState},
    video::VideoMetadata,
};

/// Probed source properties plus what was actually decoded
#[derive(Debug, Serialize)]
pub struct VideoSummary {
    #[serde(flatten)]
    pub metadata: VideoMetadata,
    pub frames_decoded: u64,
}

/// One exported scenario segment
#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub anchor_frame: Option<u64>,
    pub reason: String,
    pub file_name: String,
    pub frame_count: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

/// Body of a successful `/analyze_video`
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub scenario: String,
    pub segment_duration: u32,
    pub emotion_analysis_enabled: bool,
    pub video: VideoSummary,
    pub analysis: BTreeMap<String, AnalyzerOutput>,
    pub events: Vec<DetectedEvent>,
    pub segmented_videos: BTreeMap<String, SegmentSummary>,
    pub segmented_video_paths: BTreeMap<String, String>,
}

impl AnalyzeResponse {
    pub fn new(request: &SegmentRequest, outcome: SegmentationOutcome, storage: &StorageConfig) -> Self {
        let events = outcome.report.events().into_iter().cloned().collect();
        let metadata = &outcome.metadata;

        let mut segmented_videos = BTreeMap::new();
        let mut segmented_video_paths = BTreeMap::new();
        for (planned, export) in outcome.plan.segments.iter().zip(&outcome.exports) {
            let file_name = export
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            segmented_video_paths.insert(planned.name.clone(), storage.public_path(&file_name));
            segmented_videos.insert(
                planned.name.clone(),
                SegmentSummary {
                    start_frame: planned.start_frame,
                    end_frame: planned.end_frame,
                    start_time: metadata.timestamp_of(planned.start_frame),
                    end_time: metadata.timestamp_of(planned.end_frame),
                    anchor_frame: planned.anchor_frame,
                    reason: planned.reason.clone(),
                    file_name,
                    frame_count: export.frame_count,
                    fps: export.fps,
                    width: export.width,
                    height: export.height,
                    file_size: export.file_size,
                },
            );
        }

        Self {
            scenario: request.scenario.clone(),
            segment_duration: request.segment_duration,
            emotion_analysis_enabled: request.emotion_analysis_enabled,
            video: VideoSummary {
                metadata: outcome.metadata.clone(),
                frames_decoded: outcome.frames_decoded,
            },
            analysis: outcome.report.outputs,
            events,
            segmented_videos,
            segmented_video_paths,
        }
    }
}

/// `POST /analyze_video`
///
/// Decoding and encoding run on the blocking pool behind the job semaphore.
/// If the client disconnects, the dropped handler cancels the job.
pub async fn analyze_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let form = parse_upload(&mut multipart, &state.config.storage).await?;
    let request = form.request.clone();

    let permit = state
        .jobs
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| CutterError::generic("job queue closed"))?;

    let cancel = CancellationToken::new();
    // Dropping the handler (client gone) cancels the job
    let guard = cancel.clone().drop_guard();
    let engine = state.engine.clone();
    let upload = form.video;

    let job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let outcome = engine.run(upload.path(), &request, &cancel);
        drop(upload);
        outcome
    });

    let outcome = job
        .await
        .map_err(|e| CutterError::generic(format!("segmentation job failed: {}", e)))??;
    let _ = guard.disarm();

    info!(
        "Scenario '{}' done: {} frames decoded, {} segment(s)",
        form.request.scenario,
        outcome.frames_decoded,
        outcome.exports.len()
    );
    Ok(Json(AnalyzeResponse::new(&form.request, outcome, &state.config.storage)))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
