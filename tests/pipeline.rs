//! Decode/encode tests against real ffmpeg binaries.
//!
//! Each test returns early when ffmpeg or ffprobe is not installed.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scenario_cutter::config::Config;
use scenario_cutter::pipeline::{SegmentRequest, SegmentationEngine};
use scenario_cutter::video::{FfmpegTools, Frame, FrameReader, Segment, SegmentWriter};

fn ffmpeg_available() -> bool {
    let available = FfmpegTools::default().check_available();
    if !available {
        eprintln!("ffmpeg/ffprobe not installed, skipping");
    }
    available
}

/// Encode solid-color frames into `path` at 25fps
fn write_clip(path: &Path, width: u32, height: u32, colors: &[[u8; 3]]) {
    let frames: Vec<Frame> = colors
        .iter()
        .enumerate()
        .map(|(i, &c)| Frame::new_filled(i as u64, width, height, c))
        .collect();
    let segment = Segment::new("fixture", frames.iter().collect());
    SegmentWriter::default().write(&segment, path).unwrap();
}

fn leftover_temp_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .count()
}

#[test]
fn test_reencode_preserves_frame_count() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    let colors: Vec<[u8; 3]> = (0..20).map(|i| [i * 10, 128, 255 - i * 10]).collect();
    write_clip(&source, 32, 24, &colors);

    let reader = FrameReader::default();
    let sequence = reader.read_all(&source).unwrap();
    assert_eq!(sequence.len(), 20);
    assert_eq!(sequence.metadata().width, 32);
    assert_eq!(sequence.metadata().height, 24);

    let copy = dir.path().join("copy.mp4");
    let exported = SegmentWriter::default()
        .with_fps(sequence.metadata().fps)
        .write(&sequence.whole("copy"), &copy)
        .unwrap();
    assert_eq!(exported.frame_count, 20);

    let again = reader.read_all(&copy).unwrap();
    assert_eq!(again.len(), sequence.len());
    assert_eq!(again.metadata().width, 32);
}

#[test]
fn test_streaming_encoder_rejects_mismatched_frame() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mixed.mp4");

    let mut encoder = SegmentWriter::default().begin("mixed", &output, 16, 16).unwrap();
    encoder.push(&Frame::new_filled(0, 16, 16, [0, 0, 0])).unwrap();
    let err = encoder.push(&Frame::new_filled(1, 8, 8, [0, 0, 0])).unwrap_err();
    assert_eq!(err.kind(), "DimensionMismatch");
    drop(encoder);

    assert!(!output.exists());
    assert_eq!(leftover_temp_files(dir.path()), 0);
}

#[test]
fn test_concurrent_exports_do_not_interleave() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let output = Arc::new(dir.path().join("goal_segment.mp4"));

    let handles: Vec<_> = [(10usize, [255u8, 0, 0]), (15usize, [0u8, 0, 255])]
        .into_iter()
        .map(|(count, color)| {
            let output = Arc::clone(&output);
            std::thread::spawn(move || {
                let frames: Vec<Frame> = (0..count)
                    .map(|i| Frame::new_filled(i as u64, 32, 32, color))
                    .collect();
                let segment = Segment::new("goal", frames.iter().collect());
                SegmentWriter::default().write(&segment, output.as_path()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let result = FrameReader::default().read_all(output.as_path()).unwrap();
    assert!(
        result.len() == 10 || result.len() == 15,
        "got {} frames",
        result.len()
    );
    assert_eq!(leftover_temp_files(dir.path()), 0);
}

#[test]
fn test_engine_exports_window_around_scene_change() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("match.mp4");
    let mut colors = vec![[0u8, 0, 0]; 30];
    colors.extend(vec![[255u8, 255, 255]; 30]);
    write_clip(&source, 64, 48, &colors);

    let mut config = Config::default();
    config.storage.output_dir = dir.path().join("exports");
    let engine = SegmentationEngine::new(config);

    let request = SegmentRequest {
        scenario: "goal".to_string(),
        segment_duration: 1,
        emotion_analysis_enabled: true,
    };
    let outcome = engine.run(&source, &request, &CancellationToken::new()).unwrap();

    assert_eq!(outcome.frames_decoded, 60);
    let planned = &outcome.plan.segments[0];
    assert_eq!(planned.anchor_frame, Some(30));
    assert_eq!(planned.len(), 25);
    assert!(planned.contains(30));

    let export = &outcome.exports[0];
    assert_eq!(export.frame_count, 25);
    assert_eq!(export.path, dir.path().join("exports").join("goal_segment.mp4"));
    assert!(export.path.exists());
}

#[test]
fn test_cancelled_job_stops() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("clip.mp4");
    write_clip(&source, 16, 16, &[[10, 10, 10]; 5]);

    let mut config = Config::default();
    config.storage.output_dir = dir.path().join("exports");
    let engine = SegmentationEngine::new(config);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = SegmentRequest {
        scenario: "goal".to_string(),
        segment_duration: 1,
        emotion_analysis_enabled: false,
    };
    let err = engine.run(&source, &request, &cancel).unwrap_err();
    assert_eq!(err.kind(), "Cancelled");
    assert!(!dir.path().join("exports").join("goal_segment.mp4").exists());
}
