use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod fetch;
pub mod inference;
pub mod mock;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod rate_limit;
pub mod speech;
pub mod summarize;
pub mod topic;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use fetch::crossref::{Metadata, MetadataResolver, ResolveError};
pub use fetch::scrape::WebScraper;
pub use inference::InferenceApiModel;
pub use output::{AudioFile, AudioNaming, OutputDir, OutputError, StagedUpload};
pub use pipeline::{Pipeline, PipelineContext};
pub use rate_limit::RateLimiters;
pub use speech::{AudioSynthesizer, SpeechEngine, SpeechError, TranslateTts};
pub use summarize::{ModelError, SUMMARY_PLACEHOLDER, SummaryModel, SummaryParams, Summarizer};
pub use topic::{SubstringClassifier, TopicClassifier, UNSPECIFIED_TOPIC};

/// One unit of input: a PDF on disk, a DOI, or a web page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputItem {
    Pdf(PathBuf),
    Doi(String),
    Url(String),
}

impl InputItem {
    /// The locator exactly as the caller supplied it.
    pub fn locator(&self) -> String {
        match self {
            InputItem::Pdf(path) => path.display().to_string(),
            InputItem::Doi(doi) => doi.clone(),
            InputItem::Url(url) => url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputItem::Pdf(_) => "PDF",
            InputItem::Doi(_) => "DOI",
            InputItem::Url(_) => "URL",
        }
    }
}

/// Everything a caller can hand to a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub pdf_files: Vec<PathBuf>,
    #[serde(default)]
    pub doi_list: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub topic_list: Vec<String>,
}

impl PipelineRequest {
    /// True when there is nothing to process (topics alone do not count).
    pub fn is_empty(&self) -> bool {
        self.pdf_files.is_empty() && self.doi_list.is_empty() && self.urls.is_empty()
    }

    /// Items in input enumeration order: PDFs, then DOIs, then URLs.
    pub fn items(&self) -> Vec<InputItem> {
        let pdfs = self.pdf_files.iter().cloned().map(InputItem::Pdf);
        let dois = self.doi_list.iter().cloned().map(InputItem::Doi);
        let urls = self.urls.iter().cloned().map(InputItem::Url);
        pdfs.chain(dois).chain(urls).collect()
    }
}

/// Per-item record pairing the source locator with its topic and audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub source: String,
    pub topic: String,
    pub audio: String,
}

/// Final output of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub synthesis: String,
    pub synthesis_audio: Option<String>,
    pub citations: Vec<CitationRecord>,
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ItemStarted {
        index: usize,
        total: usize,
        item: InputItem,
    },
    /// The item produced no summary and no citation (e.g. DOI not found).
    ItemSkipped {
        index: usize,
        total: usize,
        item: InputItem,
        reason: String,
    },
    ItemCompleted {
        index: usize,
        total: usize,
        citation: CitationRecord,
    },
    Synthesizing {
        summaries: usize,
    },
    Finished {
        citations: usize,
    },
}

/// Hard failures that abort a whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("PDF extraction failed for {path}: {source}")]
    Pdf {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("audio synthesis failed: {0}")]
    Speech(#[from] SpeechError),
    #[error("output directory error: {0}")]
    Output(#[from] OutputError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker task failed: {0}")]
    Task(String),
    #[error("pipeline run cancelled")]
    Cancelled,
}

/// Runtime configuration for a pipeline context.
#[derive(Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub naming: AudioNaming,
    pub num_workers: usize,
    /// Upper bound on concurrent summarization model calls.
    pub model_concurrency: usize,
    pub http_timeout_secs: u64,
    pub scrape_timeout_secs: u64,
    pub crossref_base_url: String,
    pub crossref_mailto: Option<String>,
    pub summary_api_url: String,
    pub summary_model: String,
    pub summary_api_token: Option<String>,
    pub max_length: u32,
    pub min_length: u32,
    pub batch_size: usize,
    pub tts_base_url: String,
    pub lang: String,
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn summary_params(&self) -> SummaryParams {
        SummaryParams {
            max_length: self.max_length,
            min_length: self.min_length,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("output_dir", &self.output_dir)
            .field("naming", &self.naming)
            .field("num_workers", &self.num_workers)
            .field("model_concurrency", &self.model_concurrency)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("scrape_timeout_secs", &self.scrape_timeout_secs)
            .field("crossref_base_url", &self.crossref_base_url)
            .field(
                "crossref_mailto",
                &self.crossref_mailto.as_ref().map(|_| "***"),
            )
            .field("summary_api_url", &self.summary_api_url)
            .field("summary_model", &self.summary_model)
            .field(
                "summary_api_token",
                &self.summary_api_token.as_ref().map(|_| "***"),
            )
            .field("max_length", &self.max_length)
            .field("min_length", &self.min_length)
            .field("batch_size", &self.batch_size)
            .field("tts_base_url", &self.tts_base_url)
            .field("lang", &self.lang)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            naming: AudioNaming::Locator,
            num_workers: 4,
            model_concurrency: 2,
            http_timeout_secs: 10,
            scrape_timeout_secs: 10,
            crossref_base_url: fetch::crossref::DEFAULT_CROSSREF_URL.to_string(),
            crossref_mailto: None,
            summary_api_url: inference::DEFAULT_INFERENCE_URL.to_string(),
            summary_model: inference::DEFAULT_SUMMARY_MODEL.to_string(),
            summary_api_token: None,
            max_length: summarize::DEFAULT_MAX_LENGTH,
            min_length: summarize::DEFAULT_MIN_LENGTH,
            batch_size: 8,
            tts_base_url: speech::DEFAULT_TTS_URL.to_string(),
            lang: "en".to_string(),
        }
    }
}
