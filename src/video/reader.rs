use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{ChildStdout, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::ffmpeg::{ChildGuard, FfmpegTools, StderrCollector};
use crate::video::types::{Frame, FrameSequence, VideoMetadata};

/// Fallback when the container reports no usable frame rate
const DEFAULT_FPS: f64 = 25.0;

/// Decodes video assets into rgb24 frames through ffmpeg
#[derive(Debug, Clone)]
pub struct FrameReader {
    tools: FfmpegTools,
}

impl FrameReader {
    pub fn new(tools: FfmpegTools) -> Self {
        Self { tools }
    }

    /// Discover stream properties without decoding any frames
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<VideoMetadata> {
        let path = path.as_ref();
        check_readable(path)?;

        let mut cmd = Command::new(&self.tools.ffprobe);
        cmd.args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=codec_name,width,height,r_frame_rate,avg_frame_rate,nb_frames:format=duration",
            "-of", "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut guard = self.tools.spawn("ffprobe", &mut cmd)?;
        let stderr = StderrCollector::start(guard.child_mut().stderr.take());
        let mut stdout = String::new();
        if let Some(mut out) = guard.child_mut().stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
        let status = guard.wait()?;
        let stderr = stderr.finish();

        if !status.success() {
            return Err(VideoError::UnreadableAsset {
                path: path.display().to_string(),
                reason: if stderr.is_empty() { format!("ffprobe exited with {}", status) } else { stderr },
            }
            .into());
        }

        let metadata = parse_probe_output(&stdout).map_err(|reason| VideoError::UnreadableAsset {
            path: path.display().to_string(),
            reason,
        })?;

        debug!(
            "Probed {}: {}x{} @ {:.2}fps, codec {}",
            path.display(), metadata.width, metadata.height, metadata.fps, metadata.codec
        );
        Ok(metadata)
    }

    /// Start decoding; frames are produced lazily in source order
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<FrameStream> {
        let path = path.as_ref();
        let metadata = self.probe(path)?;

        let mut cmd = Command::new(&self.tools.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0",
                "-fps_mode", "passthrough",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = self.tools.spawn("ffmpeg", &mut cmd)?;
        let stderr = StderrCollector::start(child.child_mut().stderr.take());
        let stdout = child.child_mut().stdout.take().ok_or_else(|| VideoError::UnreadableAsset {
            path: path.display().to_string(),
            reason: "decoder stdout was not captured".to_string(),
        })?;

        Ok(FrameStream {
            path: path.to_path_buf(),
            metadata,
            stdout: BufReader::new(stdout),
            child: Some(child),
            stderr: Some(stderr),
            next_index: 0,
            done: false,
        })
    }

    /// Decode the whole asset into memory
    ///
    /// Memory grows with video length; prefer [`FrameReader::open`] for
    /// anything that can be processed incrementally.
    pub fn read_all<P: AsRef<Path>>(&self, path: P) -> Result<FrameSequence> {
        let stream = self.open(path)?;
        let metadata = stream.metadata().clone();
        let frames = stream.collect::<Result<Vec<_>>>()?;

        info!("Decoded {} frames ({}x{})", frames.len(), metadata.width, metadata.height);
        Ok(FrameSequence::new(metadata, frames))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(FfmpegTools::default())
    }
}

/// Lazily decoded frames of one asset
///
/// Yields `Ok(frame)` until the natural end of stream, or a single
/// `Err(DecodeInterrupted)` if the decoder failed part-way. Dropping the
/// stream early kills the decoder.
pub struct FrameStream {
    path: PathBuf,
    metadata: VideoMetadata,
    stdout: BufReader<ChildStdout>,
    child: Option<ChildGuard>,
    stderr: Option<StderrCollector>,
    next_index: u64,
    done: bool,
}

impl FrameStream {
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Frames yielded so far
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }

    fn interrupted(&self, reason: String) -> VideoError {
        VideoError::DecodeInterrupted {
            path: self.path.display().to_string(),
            frames_read: self.next_index,
            reason,
        }
    }

    /// Reap the decoder after stdout hit EOF
    fn finish(&mut self) -> Result<()> {
        let stderr = self.stderr.take().map(StderrCollector::finish).unwrap_or_default();
        let status = match self.child.take() {
            Some(child) => child.wait()?,
            None => return Ok(()),
        };

        if !status.success() {
            let reason = if stderr.is_empty() { format!("decoder exited with {}", status) } else { stderr };
            return Err(self.interrupted(reason).into());
        }

        if !stderr.is_empty() {
            warn!("Decoder reported problems for {}: {}", self.path.display(), stderr);
        }
        debug!("Decoder finished {} after {} frames", self.path.display(), self.next_index);
        Ok(())
    }

    /// Fill `buf` completely; returns the bytes read before EOF
    fn read_frame_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl Iterator for FrameStream {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let frame_bytes = self.metadata.frame_bytes();
        let mut buf = vec![0u8; frame_bytes];
        let filled = match self.read_frame_bytes(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(self.interrupted(e.to_string()).into()));
            }
        };

        if filled == 0 {
            self.done = true;
            return self.finish().err().map(Err);
        }

        if filled < frame_bytes {
            self.done = true;
            let _ = self.finish();
            return Some(Err(self
                .interrupted(format!("truncated frame: {} of {} bytes", filled, frame_bytes))
                .into()));
        }

        let index = self.next_index;
        self.next_index += 1;
        match Frame::from_rgb_bytes(index, self.metadata.width, self.metadata.height, buf) {
            Some(frame) => Some(Ok(frame)),
            None => {
                self.done = true;
                Some(Err(self.interrupted("frame buffer size mismatch".to_string()).into()))
            }
        }
    }
}

fn check_readable(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|e| VideoError::UnreadableAsset {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if !meta.is_file() {
        return Err(VideoError::UnreadableAsset {
            path: path.display().to_string(),
            reason: "not a regular file".to_string(),
        }
        .into());
    }

    if meta.len() == 0 {
        return Err(VideoError::UnreadableAsset {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        }
        .into());
    }

    Ok(())
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Turn `ffprobe -of json` output into metadata
fn parse_probe_output(json: &str) -> std::result::Result<VideoMetadata, String> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(format!("invalid dimensions {}x{}", width, height));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(DEFAULT_FPS);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
        duration: output
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse().ok()),
        frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
    })
}

/// Parse ffmpeg rationals like `30000/1001`; zero rates are rejected
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };

    if den == 0.0 {
        return None;
    }
    let fps = num / den;
    (fps > 0.0 && fps.is_finite()).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "programs": [],
            "streams": [{
                "codec_name": "h264",
                "width": 640,
                "height": 360,
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "nb_frames": "120"
            }],
            "format": { "duration": "4.004000" }
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!((meta.width, meta.height), (640, 360));
        assert!((meta.fps - 29.97).abs() < 0.01);
        assert_eq!(meta.codec, "h264");
        assert_eq!(meta.frame_count, Some(120));
        assert_eq!(meta.duration, Some(4.004));
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let err = parse_probe_output(r#"{"streams": [], "format": {}}"#).unwrap_err();
        assert_eq!(err, "no video stream");

        let err = parse_probe_output(r#"{"streams": [{"width": 0, "height": 0}]}"#).unwrap_err();
        assert!(err.contains("invalid dimensions"));
    }

    #[test]
    fn test_parse_probe_falls_back_to_r_frame_rate() {
        let json = r#"{"streams": [{"width": 8, "height": 8, "avg_frame_rate": "0/0", "r_frame_rate": "24/1"}]}"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.fps, 24.0);
        assert_eq!(meta.frame_count, None);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("50"), Some(50.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let reader = FrameReader::default();
        let err = reader.probe("/no/such/video.mp4").unwrap_err();
        assert_eq!(err.kind(), "UnreadableAsset");
    }

    #[test]
    fn test_zero_byte_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"").unwrap();

        let reader = FrameReader::default();
        let err = reader.open(&path).err().unwrap();
        assert_eq!(err.kind(), "UnreadableAsset");
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use crate::error::CutterError;
        use crate::video::testing::{black_frames, scripted_tools};

        fn source_in(dir: &Path) -> PathBuf {
            let path = dir.join("clip.mp4");
            std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
            path
        }

        #[test]
        fn test_decodes_every_frame_in_order() {
            let dir = tempdir().unwrap();
            let tools = scripted_tools(dir.path(), 4, 4, 3, &black_frames(4, 4, 3));

            let sequence = FrameReader::new(tools).read_all(source_in(dir.path())).unwrap();
            assert_eq!(sequence.len(), 3);
            assert_eq!(sequence.metadata().fps, 25.0);
            let indices: Vec<u64> = sequence.frames().iter().map(|f| f.index()).collect();
            assert_eq!(indices, vec![0, 1, 2]);
        }

        #[test]
        fn test_container_without_frames_is_empty_sequence() {
            let dir = tempdir().unwrap();
            let tools = scripted_tools(dir.path(), 4, 4, 0, "exit 0");

            let sequence = FrameReader::new(tools).read_all(source_in(dir.path())).unwrap();
            assert_eq!(sequence.len(), 0);
            assert_eq!((sequence.metadata().width, sequence.metadata().height), (4, 4));
        }

        #[test]
        fn test_truncated_frame_interrupts_decoding() {
            let dir = tempdir().unwrap();
            // One whole 4x4 frame, then 10 bytes of the next
            let decoder = "head -c 58 /dev/zero; echo 'corrupt packet' >&2; exit 1";
            let tools = scripted_tools(dir.path(), 4, 4, 2, decoder);

            let err = FrameReader::new(tools).read_all(source_in(dir.path())).unwrap_err();
            assert_eq!(err.kind(), "DecodeInterrupted");
            match err {
                CutterError::Video(VideoError::DecodeInterrupted { frames_read, reason, .. }) => {
                    assert_eq!(frames_read, 1);
                    assert!(reason.contains("truncated frame"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[test]
        fn test_decoder_failure_after_whole_frames_interrupts() {
            let dir = tempdir().unwrap();
            let decoder = format!("{}; echo 'decode error' >&2; exit 1", black_frames(4, 4, 2));
            let tools = scripted_tools(dir.path(), 4, 4, 5, &decoder);

            let mut stream = FrameReader::new(tools).open(source_in(dir.path())).unwrap();
            assert!(stream.next().unwrap().is_ok());
            assert!(stream.next().unwrap().is_ok());
            let err = stream.next().unwrap().unwrap_err();
            assert_eq!(err.kind(), "DecodeInterrupted");
            assert!(err.to_string().contains("decode error"));
            assert!(stream.next().is_none());
        }
    }
}
