//! # HTTP Service
//!
//! `POST /analyze_video` accepts a multipart upload and returns the analysis
//! plus the exported scenario segment. Exported files are served back under
//! the configured public prefix.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
