//! # Video Module
//!
//! Decoding assets into frames and encoding frame segments back into files.
//! Both directions shell out to ffmpeg and stream packed rgb24 through pipes.

pub mod ffmpeg;
pub mod reader;
pub mod types;
pub mod writer;

#[cfg(all(test, unix))]
pub(crate) mod testing;

pub use ffmpeg::FfmpegTools;
pub use reader::{FrameReader, FrameStream};
pub use types::{ExportedSegment, Frame, FrameSequence, Segment, VideoMetadata, VideoParams};
pub use writer::{SegmentEncoder, SegmentWriter};
