use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::StorageConfig,
    error::{Result, UploadError},
    pipeline::{validate_scenario_name, SegmentRequest},
};

/// A parsed `/analyze_video` form
#[derive(Debug)]
pub struct UploadForm {
    pub video: StoredUpload,
    pub request: SegmentRequest,
}

/// An uploaded file on disk
///
/// Removed when dropped unless uploads are retained.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
    original_name: String,
    size: u64,
    retain: bool,
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        if self.retain {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", self.path.display(), e),
        }
    }
}

/// Read the multipart form, streaming the video straight to `upload_dir`
///
/// The file name is checked before any bytes are written, so rejected
/// uploads never touch the disk.
pub async fn parse_upload(multipart: &mut Multipart, storage: &StorageConfig) -> Result<UploadForm> {
    let mut video = None;
    let mut scenario = None;
    let mut duration = None;
    let mut emotion = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                if let Some(stored) = store_video(field, storage).await? {
                    video = Some(stored);
                }
            }
            "scenario" => scenario = Some(field.text().await.map_err(malformed)?),
            "duration" => duration = Some(field.text().await.map_err(malformed)?),
            "emotion" => emotion = Some(field.text().await.map_err(malformed)?),
            other => debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    let video = video.ok_or(UploadError::NoFileProvided)?;

    let scenario = scenario
        .map(|s| s.trim().to_string())
        .ok_or_else(|| UploadError::MissingField { field: "scenario".to_string() })?;
    validate_scenario_name(&scenario)?;

    let segment_duration = parse_duration(
        duration
            .as_deref()
            .ok_or_else(|| UploadError::MissingField { field: "duration".to_string() })?,
    )?;

    let request = SegmentRequest {
        scenario,
        segment_duration,
        emotion_analysis_enabled: emotion.as_deref().is_some_and(parse_emotion),
    };

    info!(
        "Accepted upload '{}' ({} bytes) for scenario '{}'",
        video.original_name, video.size, request.scenario
    );
    Ok(UploadForm { video, request })
}

async fn store_video(mut field: Field<'_>, storage: &StorageConfig) -> Result<Option<StoredUpload>> {
    let original_name = match field.file_name() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        // A file input left empty
        _ => return Ok(None),
    };
    validate_extension(&original_name, &storage.allowed_extensions)?;

    tokio::fs::create_dir_all(&storage.upload_dir).await?;
    let path = storage
        .upload_dir
        .join(format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&original_name)));

    let file = tokio::fs::File::create(&path).await?;
    // From here on the guard owns the file and cleans it up on any error
    let mut upload = StoredUpload {
        path,
        original_name,
        size: 0,
        retain: storage.retain_uploads,
    };

    let mut writer = tokio::io::BufWriter::new(file);
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        writer.write_all(&chunk).await?;
        upload.size += chunk.len() as u64;
    }
    writer.flush().await?;

    debug!("Stored upload at {}", upload.path.display());
    Ok(Some(upload))
}

/// Case-insensitive check against the allow-list
pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<()> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension {
        Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => Ok(()),
        _ => Err(UploadError::InvalidExtension { filename: filename.to_string() }.into()),
    }
}

/// Keep only the final path component and a safe character set
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Whole seconds, at least one
pub fn parse_duration(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(UploadError::InvalidField {
            field: "duration".to_string(),
            value: value.to_string(),
        }
        .into()),
    }
}

/// Any non-empty value enables the flag
pub fn parse_emotion(value: &str) -> bool {
    !value.trim().is_empty()
}

fn malformed(err: MultipartError) -> UploadError {
    UploadError::Malformed { reason: err.to_string() }
}
