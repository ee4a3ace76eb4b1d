use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    video::VideoParams,
};

/// Main configuration for the scenario cutter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Upload and output storage settings
    pub storage: StorageConfig,

    /// Decode/encode settings
    pub video: VideoConfig,

    /// Frame analysis settings
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.storage.validate()?;
        self.video.validate()?;
        self.analysis.validate()?;
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Number of decode/encode jobs allowed to run at once
    pub max_concurrent_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 512 * 1024 * 1024,
            max_concurrent_jobs: num_cpus::get(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.max_concurrent_jobs".to_string(),
                value: self.max_concurrent_jobs.to_string()
            }.into());
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.max_upload_bytes".to_string(),
                value: self.max_upload_bytes.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Where uploads land and exported segments are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for stored uploads; never inside `output_dir`, which is served
    pub upload_dir: PathBuf,

    /// Directory for exported segment files
    pub output_dir: PathBuf,

    /// Accepted upload extensions (lowercase, without the dot)
    pub allowed_extensions: Vec<String>,

    /// Keep the uploaded source after the request completes
    pub retain_uploads: bool,

    /// URL prefix under which `output_dir` is served
    pub public_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("incoming"),
            output_dir: PathBuf::from("uploads"),
            allowed_extensions: vec!["mp4".to_string(), "avi".to_string(), "mov".to_string()],
            retain_uploads: false,
            public_prefix: "/uploads".to_string(),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.allowed_extensions".to_string(),
                value: "[]".to_string()
            }.into());
        }

        if self.upload_dir.starts_with(&self.output_dir) {
            return Err(ConfigError::InvalidValue {
                key: "storage.upload_dir".to_string(),
                value: self.upload_dir.display().to_string()
            }.into());
        }

        if !self.public_prefix.starts_with('/') || self.public_prefix.trim_end_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.public_prefix".to_string(),
                value: self.public_prefix.clone()
            }.into());
        }

        Ok(())
    }

    /// Served URL path for a file in the output directory
    pub fn public_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}

/// Video decode/encode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output encoding parameters
    pub params: VideoParams,

    /// ffmpeg binary used for decoding and encoding
    pub ffmpeg_path: String,

    /// ffprobe binary used for metadata discovery
    pub ffprobe_path: String,

    /// Frames buffered between the decoder and its consumer
    pub channel_capacity: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            params: VideoParams::default(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            channel_capacity: 32,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if !(self.params.fps > 0.0 && self.params.fps.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: "video.params.fps".to_string(),
                value: self.params.fps.to_string()
            }.into());
        }

        if self.params.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "video.params.quality".to_string(),
                value: self.params.quality.to_string()
            }.into());
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "video.channel_capacity".to_string(),
                value: self.channel_capacity.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Frame analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analyzers run on every upload, by registry name
    pub analyzers: Vec<String>,

    /// Histogram distance (0.0-1.0) above which a scene change is reported
    pub scene_change_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analyzers: vec!["scene_change".to_string(), "luminance".to_string()],
            scene_change_threshold: 0.35,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<()> {
        if !(self.scene_change_threshold > 0.0 && self.scene_change_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "analysis.scene_change_threshold".to_string(),
                value: self.scene_change_threshold.to_string()
            }.into());
        }

        Ok(())
    }
}
