use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use papercast_core::OutputError;
use tokio_util::io::ReaderStream;

use crate::models::{ApiError, BulkDelete, FileList, Message};
use crate::state::AppState;

fn internal(context: &str, e: OutputError) -> ApiError {
    tracing::error!(error = %e, "{}", context);
    ApiError::internal(format!("{}: {}", context, e))
}

/// Stream one file from the output directory as `audio/mpeg`.
pub async fn audio(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .output
        .audio_file(&filename)
        .map_err(|_| ApiError::not_found("Audio file not found"))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("Audio file not found"))?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<FileList>, ApiError> {
    let audio_files = state
        .output
        .list_audio()
        .map_err(|e| internal("Error listing files", e))?;
    Ok(Json(FileList {
        total_files: audio_files.len(),
        audio_files,
    }))
}

pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<Message>, ApiError> {
    match state.output.delete(&filename) {
        Ok(()) => Ok(Json(Message {
            message: format!("File {} deleted successfully", filename),
        })),
        Err(OutputError::NotFound(_) | OutputError::InvalidName(_)) => {
            Err(ApiError::not_found("File not found"))
        }
        Err(e) => Err(internal("Error deleting file", e)),
    }
}

pub async fn delete_all(State(state): State<Arc<AppState>>) -> Result<Json<BulkDelete>, ApiError> {
    let deleted_count = state
        .output
        .delete_all_audio()
        .map_err(|e| internal("Error deleting files", e))?;
    Ok(Json(BulkDelete {
        message: format!("Deleted {} audio files", deleted_count),
        deleted_count,
    }))
}
