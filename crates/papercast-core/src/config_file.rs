use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::output::AudioNaming;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub output: Option<OutputConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
    pub crossref: Option<CrossrefConfig>,
    pub summarizer: Option<SummarizerConfig>,
    pub speech: Option<SpeechConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub naming: Option<AudioNaming>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
    pub model_concurrency: Option<usize>,
    pub http_timeout_secs: Option<u64>,
    pub scrape_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossrefConfig {
    pub base_url: Option<String>,
    pub mailto: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub api_token: Option<String>,
    pub max_length: Option<u32>,
    pub min_length: Option<u32>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub base_url: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
}

/// Platform config directory path: `<config_dir>/papercast/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("papercast").join("config.toml"))
}

/// Load config by cascading CWD `.papercast.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".papercast.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist; a file that fails to parse is logged and ignored.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

fn pick<S, T: Clone>(
    overlay: &Option<S>,
    base: &Option<S>,
    field: impl Fn(&S) -> Option<T>,
) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (o, b) = (&overlay, &base);
    ConfigFile {
        output: Some(OutputConfig {
            dir: pick(&o.output, &b.output, |s| s.dir.clone()),
            naming: pick(&o.output, &b.output, |s| s.naming),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: pick(&o.concurrency, &b.concurrency, |c| c.num_workers),
            model_concurrency: pick(&o.concurrency, &b.concurrency, |c| c.model_concurrency),
            http_timeout_secs: pick(&o.concurrency, &b.concurrency, |c| c.http_timeout_secs),
            scrape_timeout_secs: pick(&o.concurrency, &b.concurrency, |c| c.scrape_timeout_secs),
        }),
        crossref: Some(CrossrefConfig {
            base_url: pick(&o.crossref, &b.crossref, |c| c.base_url.clone()),
            mailto: pick(&o.crossref, &b.crossref, |c| c.mailto.clone()),
        }),
        summarizer: Some(SummarizerConfig {
            api_url: pick(&o.summarizer, &b.summarizer, |s| s.api_url.clone()),
            model: pick(&o.summarizer, &b.summarizer, |s| s.model.clone()),
            api_token: pick(&o.summarizer, &b.summarizer, |s| s.api_token.clone()),
            max_length: pick(&o.summarizer, &b.summarizer, |s| s.max_length),
            min_length: pick(&o.summarizer, &b.summarizer, |s| s.min_length),
            batch_size: pick(&o.summarizer, &b.summarizer, |s| s.batch_size),
        }),
        speech: Some(SpeechConfig {
            base_url: pick(&o.speech, &b.speech, |s| s.base_url.clone()),
            lang: pick(&o.speech, &b.speech, |s| s.lang.clone()),
        }),
        server: Some(ServerConfig {
            host: pick(&o.server, &b.server, |s| s.host.clone()),
            port: pick(&o.server, &b.server, |s| s.port),
            cors_origins: pick(&o.server, &b.server, |s| s.cors_origins.clone()),
        }),
    }
}

impl ConfigFile {
    /// Overwrite `config` fields with every value present in this file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref output) = self.output {
            if let Some(ref dir) = output.dir {
                config.output_dir = PathBuf::from(dir);
            }
            if let Some(naming) = output.naming {
                config.naming = naming;
            }
        }
        if let Some(ref c) = self.concurrency {
            if let Some(n) = c.num_workers {
                config.num_workers = n.max(1);
            }
            if let Some(n) = c.model_concurrency {
                config.model_concurrency = n.max(1);
            }
            if let Some(secs) = c.http_timeout_secs {
                config.http_timeout_secs = secs;
            }
            if let Some(secs) = c.scrape_timeout_secs {
                config.scrape_timeout_secs = secs;
            }
        }
        if let Some(ref c) = self.crossref {
            if let Some(ref url) = c.base_url {
                config.crossref_base_url = url.clone();
            }
            if c.mailto.is_some() {
                config.crossref_mailto = c.mailto.clone();
            }
        }
        if let Some(ref s) = self.summarizer {
            if let Some(ref url) = s.api_url {
                config.summary_api_url = url.clone();
            }
            if let Some(ref model) = s.model {
                config.summary_model = model.clone();
            }
            if s.api_token.is_some() {
                config.summary_api_token = s.api_token.clone();
            }
            if let Some(n) = s.max_length {
                config.max_length = n;
            }
            if let Some(n) = s.min_length {
                config.min_length = n;
            }
            if let Some(n) = s.batch_size {
                config.batch_size = n.max(1);
            }
        }
        if let Some(ref s) = self.speech {
            if let Some(ref url) = s.base_url {
                config.tts_base_url = url.clone();
            }
            if let Some(ref lang) = s.lang {
                config.lang = lang.clone();
            }
        }
    }
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
///
/// Unparsable numeric values are logged and ignored.
pub fn apply_env_with(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    fn parsed<T: std::str::FromStr>(key: &str, value: String) -> Option<T> {
        match value.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(%key, %value, "ignoring invalid environment value");
                None
            }
        }
    }

    if let Some(dir) = lookup("PAPERCAST_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(n) = lookup("PAPERCAST_WORKERS").and_then(|v| parsed::<usize>("PAPERCAST_WORKERS", v)) {
        config.num_workers = n.max(1);
    }
    if let Some(secs) =
        lookup("PAPERCAST_HTTP_TIMEOUT").and_then(|v| parsed::<u64>("PAPERCAST_HTTP_TIMEOUT", v))
    {
        config.http_timeout_secs = secs;
    }
    if let Some(mailto) = lookup("CROSSREF_MAILTO").filter(|v| !v.is_empty()) {
        config.crossref_mailto = Some(mailto);
    }
    if let Some(url) = lookup("PAPERCAST_SUMMARY_API_URL") {
        config.summary_api_url = url;
    }
    if let Some(model) = lookup("PAPERCAST_SUMMARY_MODEL") {
        config.summary_model = model;
    }
    if let Some(token) = lookup("HF_API_TOKEN").filter(|v| !v.is_empty()) {
        config.summary_api_token = Some(token);
    }
    if let Some(url) = lookup("PAPERCAST_TTS_URL") {
        config.tts_base_url = url;
    }
}

/// Environment overrides from the process environment.
pub fn apply_env(config: &mut Config) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Defaults, then config files, then environment.
pub fn resolve_config() -> (Config, ConfigFile) {
    let file = load_config();
    let mut config = Config::default();
    file.apply_to(&mut config);
    apply_env(&mut config);
    (config, file)
}
