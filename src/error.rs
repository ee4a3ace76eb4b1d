use thiserror::Error;

/// Main error type for the scenario-cutter library
#[derive(Error, Debug)]
pub enum CutterError {
    #[error("Upload rejected: {0}")]
    Upload(#[from] UploadError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Upload and form validation errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No video file provided")]
    NoFileProvided,

    #[error("Invalid file extension: {filename}")]
    InvalidExtension { filename: String },

    #[error("Missing form field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: String, value: String },

    #[error("Invalid scenario name: {name}")]
    InvalidScenario { name: String },

    #[error("Malformed upload: {reason}")]
    Malformed { reason: String },
}

/// Decode and encode errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Unreadable video asset {path}: {reason}")]
    UnreadableAsset { path: String, reason: String },

    #[error("Decoding of {path} stopped after {frames_read} frames: {reason}")]
    DecodeInterrupted {
        path: String,
        frames_read: u64,
        reason: String,
    },

    #[error("Segment '{name}' contains no frames")]
    EmptySegment { name: String },

    #[error("Frame {index} is {found_width}x{found_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: u64,
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("Encoding to {path} failed: {reason}")]
    EncodingFailure { path: String, reason: String },

    #[error("Required tool not available: {tool}")]
    ToolUnavailable { tool: String },

    #[error("Processing cancelled")]
    Cancelled,
}

/// Analyzer and planning errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analyzer not found: {name}")]
    UnknownAnalyzer { name: String },

    #[error("Analyzer {analyzer} failed: {reason}")]
    Failed { analyzer: String, reason: String },

    #[error("Invalid frame range: {details}")]
    InvalidRange { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CutterError
pub type Result<T> = std::result::Result<T, CutterError>;

impl CutterError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Stable error code reported to HTTP callers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload(e) => match e {
                UploadError::NoFileProvided => "NoFileProvided",
                UploadError::InvalidExtension { .. } => "InvalidExtension",
                UploadError::MissingField { .. } => "MissingField",
                UploadError::InvalidField { .. } => "InvalidField",
                UploadError::InvalidScenario { .. } => "InvalidScenario",
                UploadError::Malformed { .. } => "MalformedUpload",
            },
            Self::Video(e) => match e {
                VideoError::UnreadableAsset { .. } => "UnreadableAsset",
                VideoError::DecodeInterrupted { .. } => "DecodeInterrupted",
                VideoError::EmptySegment { .. } => "EmptySegment",
                VideoError::DimensionMismatch { .. } => "DimensionMismatch",
                VideoError::EncodingFailure { .. } => "EncodingFailure",
                VideoError::ToolUnavailable { .. } => "ToolUnavailable",
                VideoError::Cancelled => "Cancelled",
            },
            Self::Analysis(e) => match e {
                AnalysisError::UnknownAnalyzer { .. } => "UnknownAnalyzer",
                AnalysisError::Failed { .. } => "AnalyzerFailed",
                AnalysisError::InvalidRange { .. } => "InvalidRange",
            },
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Generic(_) => "InternalError",
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // A busy machine can fail to spawn ffmpeg or lose its pipe
            Self::Video(VideoError::ToolUnavailable { .. }) => true,
            Self::Video(VideoError::EncodingFailure { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Upload(UploadError::NoFileProvided) => "No video file provided".to_string(),
            Self::Upload(UploadError::InvalidExtension { .. }) => {
                "Invalid file extension. Supported formats: mp4, avi, mov".to_string()
            }
            Self::Video(VideoError::UnreadableAsset { .. }) => {
                "Could not read the uploaded video. Please check it is a valid mp4, avi or mov file."
                    .to_string()
            }
            Self::Video(VideoError::ToolUnavailable { tool }) => {
                format!("Video tooling '{}' is not installed on the server.", tool)
            }
            _ => self.to_string(),
        }
    }
}
