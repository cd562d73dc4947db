use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use papercast_core::{PipelineRequest, PipelineResult, ProgressEvent, StagedUpload};
use tokio_util::sync::CancellationToken;

use crate::models::{ApiError, ProcessData};
use crate::state::AppState;
use crate::upload;

const NO_INPUT: &str = "At least one input type (PDFs, DOIs, or URLs) is required";

fn log_progress(event: ProgressEvent) {
    match event {
        ProgressEvent::ItemStarted { index, total, item } => {
            tracing::info!(item = index + 1, total, kind = item.kind(), locator = %item.locator(), "processing");
        }
        ProgressEvent::ItemSkipped {
            index,
            total,
            reason,
            ..
        } => tracing::warn!(item = index + 1, total, %reason, "item skipped"),
        ProgressEvent::ItemCompleted {
            index,
            total,
            citation,
        } => tracing::info!(item = index + 1, total, audio = %citation.audio, "item done"),
        ProgressEvent::Synthesizing { summaries } => {
            tracing::info!(summaries, "synthesizing across items")
        }
        ProgressEvent::Finished { citations } => tracing::info!(citations, "run finished"),
    }
}

fn discard_all(staged: Vec<StagedUpload>) {
    for upload in staged {
        upload.discard();
    }
}

pub async fn process(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PipelineResult>, ApiError> {
    let form = upload::parse_multipart(multipart)
        .await
        .map_err(ApiError::bad_request)?;

    let data: ProcessData = serde_json::from_str(form.data.as_deref().unwrap_or("{}"))
        .map_err(|_| ApiError::bad_request("Invalid JSON data"))?;

    if form.pdfs.is_empty() && data.doi_list.is_empty() && data.urls.is_empty() {
        return Err(ApiError::bad_request(NO_INPUT));
    }

    let mut staged = Vec::with_capacity(form.pdfs.len());
    let mut original_names = Vec::with_capacity(form.pdfs.len());
    for pdf in &form.pdfs {
        match state.output.store_upload(&pdf.filename, &pdf.data) {
            Ok(upload) => {
                original_names.push((upload.path().display().to_string(), pdf.filename.clone()));
                staged.push(upload);
            }
            Err(e) => {
                discard_all(staged);
                return Err(ApiError::internal(format!("Error saving PDF: {}", e)));
            }
        }
    }

    let request = PipelineRequest {
        pdf_files: staged.iter().map(|u| PathBuf::from(u.path())).collect(),
        doi_list: data.doi_list,
        urls: data.urls,
        topic_list: data.topic_list,
    };
    tracing::info!(
        pdfs = request.pdf_files.len(),
        dois = request.doi_list.len(),
        urls = request.urls.len(),
        topics = request.topic_list.len(),
        "processing request"
    );

    // Dropping the handler (client disconnect) cancels the run.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = state.pipeline.run(&request, log_progress, cancel).await;
    discard_all(staged);

    let mut result = outcome.map_err(|e| {
        tracing::error!(error = %e, "error processing papers");
        ApiError::internal(format!("Internal server error: {}", e))
    })?;

    // Report uploads under the name the client sent, not the staging path.
    for citation in &mut result.citations {
        if let Some((_, original)) = original_names.iter().find(|(p, _)| *p == citation.source) {
            citation.source = original.clone();
        }
    }
    Ok(Json(result))
}
