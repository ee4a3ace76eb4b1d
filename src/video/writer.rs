use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{quality_to_qscale, ChildGuard, FfmpegTools, StderrCollector};
use crate::video::types::{check_dimensions, ExportedSegment, Frame, Segment, VideoParams};

/// Re-encodes frames into standalone video files
///
/// Output always goes to a uniquely named temporary file next to the target
/// and is renamed into place only once the encoder exits cleanly, so readers
/// of the target path never observe a partial or interleaved file.
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    tools: FfmpegTools,
    params: VideoParams,
}

impl SegmentWriter {
    pub fn new(tools: FfmpegTools, params: VideoParams) -> Self {
        Self { tools, params }
    }

    /// Encode at `fps` instead of the configured output rate
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.params.fps = fps;
        self
    }

    pub fn params(&self) -> &VideoParams {
        &self.params
    }

    /// Encode a whole segment to `output`
    ///
    /// Dimensions are validated before the encoder starts, so an empty or
    /// mixed-size segment never creates a file.
    pub fn write<P: AsRef<Path>>(&self, segment: &Segment<'_>, output: P) -> Result<ExportedSegment> {
        let (width, height) = segment.uniform_dimensions()?;

        let mut encoder = self.begin(segment.name(), output, width, height)?;
        for frame in segment.frames() {
            encoder.push(frame)?;
        }
        encoder.finish()
    }

    /// Start a streaming encode of `width`x`height` frames
    pub fn begin<P: AsRef<Path>>(
        &self,
        name: &str,
        output: P,
        width: u32,
        height: u32,
    ) -> Result<SegmentEncoder> {
        let final_path = output.as_ref().to_path_buf();
        let temp_path = temp_path_for(&final_path);

        let mut cmd = Command::new(&self.tools.ffmpeg);
        cmd.args([
            "-hide_banner", "-nostdin",
            "-loglevel", "error",
            "-y",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{}x{}", width, height),
            "-r", &self.params.fps.to_string(),
            "-i", "-",
            // yuv420p needs even dimensions
            "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v", &self.params.codec,
            "-q:v", &quality_to_qscale(self.params.quality).to_string(),
            "-pix_fmt", "yuv420p",
            "-f", &self.params.container,
        ])
        .arg(&temp_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        let mut child = self.tools.spawn("ffmpeg", &mut cmd)?;
        let stderr = StderrCollector::start(child.child_mut().stderr.take());
        let stdin = child.child_mut().stdin.take();

        let (encoded_width, encoded_height) = encoded_dimensions(width, height);
        if (encoded_width, encoded_height) != (width, height) {
            debug!(
                "Padding '{}' from {}x{} to {}x{}",
                name, width, height, encoded_width, encoded_height
            );
        }
        debug!("Encoding '{}' to {} via {}", name, final_path.display(), temp_path.display());

        Ok(SegmentEncoder {
            name: name.to_string(),
            final_path,
            temp_path,
            width,
            height,
            encoded: (encoded_width, encoded_height),
            fps: self.params.fps,
            stdin,
            child: Some(child),
            stderr: Some(stderr),
            frames_written: 0,
            committed: false,
        })
    }
}

impl Default for SegmentWriter {
    fn default() -> Self {
        Self::new(FfmpegTools::default(), VideoParams::default())
    }
}

/// An in-progress encode
///
/// Dropping it without calling [`SegmentEncoder::finish`] kills the encoder
/// and removes the temporary file.
pub struct SegmentEncoder {
    name: String,
    final_path: PathBuf,
    temp_path: PathBuf,
    width: u32,
    height: u32,
    /// Size of the output stream after padding
    encoded: (u32, u32),
    fps: f64,
    stdin: Option<ChildStdin>,
    child: Option<ChildGuard>,
    stderr: Option<StderrCollector>,
    frames_written: u64,
    committed: bool,
}

impl SegmentEncoder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Append one frame; its size must match the encoder's
    pub fn push(&mut self, frame: &Frame) -> Result<()> {
        check_dimensions((self.width, self.height), frame)?;

        let stdin = self.stdin.as_mut().ok_or_else(|| VideoError::EncodingFailure {
            path: self.final_path.display().to_string(),
            reason: "encoder input already closed".to_string(),
        })?;

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            // A broken pipe means ffmpeg gave up; its stderr says why
            let reason = if e.kind() == ErrorKind::BrokenPipe {
                self.stdin = None;
                let stderr = self.stderr.take().map(StderrCollector::finish).unwrap_or_default();
                if stderr.is_empty() { e.to_string() } else { stderr }
            } else {
                e.to_string()
            };
            return Err(VideoError::EncodingFailure {
                path: self.final_path.display().to_string(),
                reason,
            }
            .into());
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Close the input, wait for the encoder and move the file into place
    pub fn finish(mut self) -> Result<ExportedSegment> {
        if self.frames_written == 0 {
            return Err(VideoError::EmptySegment { name: self.name.clone() }.into());
        }

        drop(self.stdin.take());
        let status = match self.child.take() {
            Some(child) => child.wait()?,
            None => return Err(self.failure("encoder already reaped".to_string())),
        };
        let stderr = self.stderr.take().map(StderrCollector::finish).unwrap_or_default();

        if !status.success() {
            let reason = if stderr.is_empty() { format!("encoder exited with {}", status) } else { stderr };
            return Err(self.failure(reason));
        }

        std::fs::rename(&self.temp_path, &self.final_path)
            .map_err(|e| self.failure(format!("could not move output into place: {}", e)))?;
        self.committed = true;

        let file_size = std::fs::metadata(&self.final_path)?.len();
        info!(
            "Exported '{}': {} frames @ {}fps -> {} ({:.1} KB)",
            self.name,
            self.frames_written,
            self.fps,
            self.final_path.display(),
            file_size as f64 / 1024.0
        );

        Ok(ExportedSegment {
            name: self.name.clone(),
            path: self.final_path.clone(),
            frame_count: self.frames_written,
            fps: self.fps,
            width: self.encoded.0,
            height: self.encoded.1,
            file_size,
        })
    }

    fn failure(&self, reason: String) -> crate::CutterError {
        VideoError::EncodingFailure {
            path: self.final_path.display().to_string(),
            reason,
        }
        .into()
    }
}

impl Drop for SegmentEncoder {
    fn drop(&mut self) {
        // Close stdin first so a still-running encoder is not blocked on it
        drop(self.stdin.take());
        drop(self.child.take());

        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove temporary file {}: {}", self.temp_path.display(), e);
                }
            }
        }
    }
}

/// yuv420p output rounds both sides up to even
fn encoded_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width + width % 2, height + height % 2)
}

/// `dir/.name.<uuid>.part` next to the final output
fn temp_path_for(final_path: &Path) -> PathBuf {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_string());
    final_path.with_file_name(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::{FrameSequence, VideoMetadata};
    use tempfile::tempdir;

    fn sequence(sizes: &[(u32, u32)]) -> FrameSequence {
        let metadata = VideoMetadata {
            width: 16,
            height: 16,
            fps: 25.0,
            codec: "rawvideo".to_string(),
            duration: None,
            frame_count: None,
        };
        let frames = sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| Frame::new_filled(i as u64, w, h, [200, 10, 10]))
            .collect();
        FrameSequence::new(metadata, frames)
    }

    #[test]
    fn test_empty_segment_creates_no_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("goal_segment.mp4");
        let seq = sequence(&[]);

        let err = SegmentWriter::default().write(&seq.whole("goal"), &output).unwrap_err();
        assert_eq!(err.kind(), "EmptySegment");
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_mismatched_dimensions_create_no_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("goal_segment.mp4");
        let seq = sequence(&[(16, 16), (16, 16), (32, 16)]);

        let err = SegmentWriter::default().write(&seq.whole("goal"), &output).unwrap_err();
        assert_eq!(err.kind(), "DimensionMismatch");
        assert!(!output.exists());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let final_path = Path::new("/srv/out/goal_segment.mp4");
        let a = temp_path_for(final_path);
        let b = temp_path_for(final_path);

        assert_eq!(a.parent(), final_path.parent());
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".goal_segment.mp4."));
        assert!(name.ends_with(".part"));
    }

    #[test]
    fn test_encoded_dimensions_round_up_to_even() {
        assert_eq!(encoded_dimensions(32, 24), (32, 24));
        assert_eq!(encoded_dimensions(33, 25), (34, 26));
        assert_eq!(encoded_dimensions(1, 2), (2, 2));
    }

    #[cfg(unix)]
    #[test]
    fn test_odd_frames_report_padded_size() {
        let dir = tempdir().unwrap();
        let tools = crate::video::testing::scripted_tools(dir.path(), 33, 25, 0, "exit 1");
        let output = dir.path().join("goal_segment.mp4");
        let seq = sequence(&[(33, 25), (33, 25), (33, 25)]);

        let exported = SegmentWriter::new(tools, VideoParams::default())
            .write(&seq.whole("goal"), &output)
            .unwrap();

        assert_eq!((exported.width, exported.height), (34, 26));
        assert_eq!(exported.frame_count, 3);
        // Raw input is still the native size; ffmpeg does the padding
        let args = std::fs::read_to_string(dir.path().join("encoder.args")).unwrap();
        assert!(args.contains("-s 33x25"));
        assert!(args.contains("pad=ceil(iw/2)*2:ceil(ih/2)*2"));
        assert_eq!(exported.file_size, 3 * 33 * 25 * 3);
    }

    #[test]
    fn test_with_fps_overrides_params() {
        let writer = SegmentWriter::default().with_fps(30.0);
        assert_eq!(writer.params().fps, 30.0);
        assert_eq!(writer.params().codec, "mpeg4");
    }
}
