use std::sync::Arc;

use papercast_core::config_file::ConfigFile;
use papercast_core::{OutputDir, Pipeline, PipelineContext};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub pipeline: Pipeline,
    pub output: OutputDir,
}

impl AppState {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            output: ctx.output.clone(),
            pipeline: Pipeline::new(ctx),
        }
    }
}

/// Listener and CORS settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerSettings {
    /// Defaults, overridden by the `[server]` section, then by `lookup` (the environment).
    pub fn resolve(file: &ConfigFile, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(ref server) = file.server {
            if let Some(ref host) = server.host {
                settings.host = host.clone();
            }
            if let Some(port) = server.port {
                settings.port = port;
            }
            if let Some(ref origins) = server.cors_origins {
                settings.cors_origins = origins.clone();
            }
        }
        if let Some(host) = lookup("PAPERCAST_HOST").filter(|h| !h.is_empty()) {
            settings.host = host;
        }
        if let Some(port) = lookup("PAPERCAST_PORT") {
            match port.trim().parse() {
                Ok(p) => settings.port = p,
                Err(_) => tracing::warn!(%port, "ignoring invalid PAPERCAST_PORT"),
            }
        }
        settings
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
