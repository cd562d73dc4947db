use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use papercast_core::AudioFile;
use serde::{Deserialize, Serialize};
use serde_json::json;

// ── Request bodies ──────────────────────────────────────────────────────

/// The JSON carried in the `data` form field of `/process`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessData {
    #[serde(default)]
    pub doi_list: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub topic_list: Vec<String>,
}

// ── Response bodies ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FileList {
    pub audio_files: Vec<AudioFile>,
    pub total_files: usize,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BulkDelete {
    pub message: String,
    pub deleted_count: usize,
}

/// An HTTP error rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
