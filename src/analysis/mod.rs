//! # Frame Analysis
//!
//! Analyzers consume the decoded frames of an upload and produce typed
//! results that drive segment selection.
//!
//! ## Built-in Analyzers
//!
//! - **scene_change**: cuts between shots, from luma histogram jumps
//! - **luminance**: mean brightness per second
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scenario_cutter::analysis::{AnalysisSession, AnalyzerRegistry};
//! use scenario_cutter::config::AnalysisConfig;
//! use scenario_cutter::video::FrameReader;
//!
//! # fn main() -> scenario_cutter::Result<()> {
//! let config = AnalysisConfig::default();
//! let registry = AnalyzerRegistry::new();
//! let session = AnalysisSession::new(registry.build(&config.analyzers, &config)?);
//!
//! let sequence = FrameReader::default().read_all("match.mp4")?;
//! let report = session.analyze_sequence(&sequence)?;
//! println!("{} events", report.events().len());
//! # Ok(())
//! # }
//! ```

pub mod luminance;
pub mod registry;
pub mod scene_change;
pub mod session;
pub mod traits;

pub use luminance::LuminanceAnalyzer;
pub use registry::AnalyzerRegistry;
pub use scene_change::SceneChangeAnalyzer;
pub use session::{AnalysisReport, AnalysisSession};
pub use traits::{Analyzer, AnalyzerOutput, DetectedEvent, LuminanceProfile};
