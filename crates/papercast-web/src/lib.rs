//! REST API and form UI over the papercast pipeline.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

pub mod handlers;
pub mod models;
pub mod state;
pub mod template;
pub mod upload;

pub use state::{AppState, ServerSettings};

pub const SERVICE_NAME: &str = "Research Paper Podcast System";
/// Upper bound on a `/process` request body.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            // Credentialed CORS cannot use a wildcard origin.
            Ok(v) if v != "*" => Some(v),
            _ => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Build the router with every route, the upload limit and CORS.
pub fn app(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::index::root))
        .route("/health", get(handlers::index::health))
        .route("/ui", get(handlers::index::ui))
        .route("/process", axum::routing::post(handlers::process::process))
        .route("/audio/{filename}", get(handlers::files::audio))
        .route(
            "/files",
            get(handlers::files::list).delete(handlers::files::delete_all),
        )
        .route(
            "/files/{filename}",
            axum::routing::delete(handlers::files::delete_one),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
