//! Process plumbing shared by the reader and the writer.

use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::config::VideoConfig;
use crate::error::{Result, VideoError};

/// Locations of the ffmpeg binaries
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegTools {
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }

    /// Both binaries can be launched
    pub fn check_available(&self) -> bool {
        [&self.ffmpeg, &self.ffprobe].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        })
    }

    pub(crate) fn spawn(&self, tool: &str, cmd: &mut Command) -> Result<ChildGuard> {
        debug!("Spawning {:?}", cmd);
        match cmd.spawn() {
            Ok(child) => Ok(ChildGuard::new(child)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VideoError::ToolUnavailable { tool: tool.to_string() }.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Owns a child process and kills it if dropped before being reaped
pub(crate) struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, reaped: false }
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait for a normal exit and disarm the guard
    pub fn wait(mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait();
        self.reaped = true;
        status
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            // InvalidInput means it already exited
            if e.kind() != ErrorKind::InvalidInput {
                warn!("Failed to kill child process {}: {}", self.child.id(), e);
            }
        }
        let _ = self.child.wait();
    }
}

/// Drains a child's stderr on a helper thread so the pipe never fills up
pub(crate) struct StderrCollector {
    handle: Option<JoinHandle<String>>,
}

impl StderrCollector {
    pub fn start(stderr: Option<ChildStderr>) -> Self {
        let handle = stderr.map(|mut stderr| {
            std::thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            })
        });
        Self { handle }
    }

    /// Collected output, trimmed; blocks until the pipe closes
    pub fn finish(mut self) -> String {
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

/// Map 0-100 quality onto ffmpeg's `-q:v` scale (2 best, 31 worst)
pub(crate) fn quality_to_qscale(quality: u8) -> u8 {
    let quality = quality.min(100) as f32 / 100.0;
    (31.0 - quality * 29.0).round() as u8
}
