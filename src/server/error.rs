use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{CutterError, VideoError};

/// HTTP-facing wrapper around [`CutterError`]
///
/// Every failure becomes `{"error": <message>, "code": <kind>}` with a status
/// derived from the error kind.
#[derive(Debug)]
pub struct ApiError(pub CutterError);

impl<E> From<E> for ApiError
where
    E: Into<CutterError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

/// Form problems are the caller's fault, undecodable or unusable media is
/// unprocessable, missing tooling is a server outage
pub fn status_for(err: &CutterError) -> StatusCode {
    match err {
        CutterError::Upload(_) => StatusCode::BAD_REQUEST,
        CutterError::Video(e) => match e {
            VideoError::UnreadableAsset { .. }
            | VideoError::DecodeInterrupted { .. }
            | VideoError::EmptySegment { .. }
            | VideoError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            VideoError::ToolUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            VideoError::EncodingFailure { .. } | VideoError::Cancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
        CutterError::Analysis(crate::error::AnalysisError::InvalidRange { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, code = self.0.kind(), "Request failed");
        } else {
            tracing::warn!(error = %self.0, code = self.0.kind(), "Request rejected");
        }

        let body = json!({
            "error": self.0.user_message(),
            "code": self.0.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}
