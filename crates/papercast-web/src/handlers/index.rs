use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::Html;
use serde_json::{Value, json};

use crate::state::AppState;
use crate::{MAX_UPLOAD_BYTES, SERVICE_NAME, template};

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("{} API", SERVICE_NAME),
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "process": "/process",
            "audio": "/audio/{filename}",
            "files": "/files",
            "ui": "/ui",
        }
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "backend": "operational",
        "output_directory": state.output.path().display().to_string(),
        "output_directory_exists": state.output.exists(),
    }))
}

pub async fn ui() -> Html<String> {
    template::render_ui(MAX_UPLOAD_BYTES / (1024 * 1024))
}
