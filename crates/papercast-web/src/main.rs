use std::sync::Arc;

use papercast_core::{PipelineContext, config_file};
use papercast_pdf_mupdf::MupdfBackend;
use papercast_web::{AppState, ServerSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, file) = config_file::resolve_config();
    let settings = ServerSettings::resolve(&file, |key| std::env::var(key).ok());
    tracing::info!(?config, "resolved configuration");

    let ctx = Arc::new(PipelineContext::with_defaults(
        config,
        Arc::new(MupdfBackend::new()),
    ));
    ctx.output.ensure()?;
    tracing::info!(dir = %ctx.output.path().display(), "audio files will be stored here");

    let state = Arc::new(AppState::new(ctx));
    let app = papercast_web::app(state, &settings.cors_origins);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{addr} (form UI at /ui)");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
