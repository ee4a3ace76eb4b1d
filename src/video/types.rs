use std::ops::Range;
use std::path::PathBuf;

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result, VideoError};

/// A single decoded video frame
///
/// Wraps an RGB image buffer together with the frame's 0-based position in
/// the source video.
#[derive(Clone, Debug)]
pub struct Frame {
    index: u64,
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(index: u64, buffer: RgbImage) -> Self {
        Self { index, buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(index: u64, width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { index, buffer }
    }

    /// Create a frame from packed rgb24 bytes
    pub fn from_rgb_bytes(index: u64, width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data)
            .map(|buffer| Self { index, buffer })
    }

    /// Position of this frame in the source video
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// `(width, height)` in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Packed rgb24 bytes, row-major
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Output encoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// Frame rate written into exported segments, independent of the source
    pub fps: f64,

    /// ffmpeg encoder name
    pub codec: String,

    /// ffmpeg muxer name; also the extension of exported files
    pub container: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 25.0,
            codec: "mpeg4".to_string(),
            container: "mp4".to_string(),
            quality: 85,
        }
    }
}

/// Stream properties discovered by probing a video asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub duration: Option<f64>,
    /// Frame count declared by the container, if any
    pub frame_count: Option<u64>,
}

impl VideoMetadata {
    /// Bytes of one packed rgb24 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Timestamp in seconds of the given frame index
    pub fn timestamp_of(&self, index: u64) -> f64 {
        if self.fps > 0.0 {
            index as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// The complete, ordered decode of a video asset
#[derive(Debug, Clone)]
pub struct FrameSequence {
    metadata: VideoMetadata,
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(metadata: VideoMetadata, frames: Vec<Frame>) -> Self {
        Self { metadata, frames }
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Every frame as one segment
    pub fn whole(&self, name: impl Into<String>) -> Segment<'_> {
        Segment::new(name, self.frames.iter().collect())
    }

    /// A contiguous run of frames, end exclusive
    pub fn segment(&self, name: impl Into<String>, range: Range<usize>) -> Result<Segment<'_>> {
        if range.start > range.end || range.end > self.frames.len() {
            return Err(AnalysisError::InvalidRange {
                details: format!(
                    "{}..{} outside sequence of {} frames",
                    range.start,
                    range.end,
                    self.frames.len()
                ),
            }
            .into());
        }

        Ok(Segment::new(name, self.frames[range].iter().collect()))
    }

    /// An arbitrary ordered selection of frames by index
    pub fn select(&self, name: impl Into<String>, indices: &[usize]) -> Result<Segment<'_>> {
        let frames = indices
            .iter()
            .map(|&i| {
                self.frames.get(i).ok_or_else(|| AnalysisError::InvalidRange {
                    details: format!("frame {} outside sequence of {} frames", i, self.frames.len()),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Segment::new(name, frames))
    }
}

/// A named selection of frames borrowed from a [`FrameSequence`]
#[derive(Debug, Clone)]
pub struct Segment<'a> {
    name: String,
    frames: Vec<&'a Frame>,
}

impl<'a> Segment<'a> {
    pub fn new(name: impl Into<String>, frames: Vec<&'a Frame>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames(&self) -> &[&'a Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shared `(width, height)` of every frame
    ///
    /// Fails with `EmptySegment` when there is nothing to derive dimensions
    /// from and with `DimensionMismatch` on the first frame that differs.
    pub fn uniform_dimensions(&self) -> Result<(u32, u32)> {
        let first = self.frames.first().ok_or_else(|| VideoError::EmptySegment {
            name: self.name.clone(),
        })?;
        let expected = first.dimensions();

        for frame in &self.frames[1..] {
            check_dimensions(expected, frame)?;
        }

        Ok(expected)
    }
}

/// Fail with `DimensionMismatch` unless `frame` is exactly `expected` in size
pub(crate) fn check_dimensions(expected: (u32, u32), frame: &Frame) -> Result<()> {
    let found = frame.dimensions();
    if found != expected {
        return Err(VideoError::DimensionMismatch {
            index: frame.index(),
            expected_width: expected.0,
            expected_height: expected.1,
            found_width: found.0,
            found_height: found.1,
        }
        .into());
    }
    Ok(())
}

/// A segment that has been encoded to disk
#[derive(Debug, Clone, Serialize)]
pub struct ExportedSegment {
    pub name: String,
    pub path: PathBuf,
    pub frame_count: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}
