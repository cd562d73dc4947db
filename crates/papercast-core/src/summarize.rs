//! Paragraph-wise abstractive summarization.
//!
//! The summarizer owns the single recovery policy for model failures: any
//! error from the model turns into [`SUMMARY_PLACEHOLDER`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::Config;

/// Returned whenever no summary could be produced.
pub const SUMMARY_PLACEHOLDER: &str = "Summary unavailable.";
pub const DEFAULT_MAX_LENGTH: u32 = 200;
pub const DEFAULT_MIN_LENGTH: u32 = 50;
/// Paragraphs must be strictly longer than this (in characters) to be summarized.
pub const MIN_PARAGRAPH_CHARS: usize = 100;

/// Output length bounds passed to the model, in model tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryParams {
    pub max_length: u32,
    pub min_length: u32,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    Malformed(String),
    #[error("model returned {got} summaries for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("{0}")]
    Other(String),
}

pub type ModelFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, ModelError>> + Send + 'a>>;

/// A pretrained abstractive summarization model.
pub trait SummaryModel: Send + Sync {
    fn name(&self) -> &str;

    /// Summarize each input independently, returning one summary per input in order.
    fn summarize_batch<'a>(&'a self, inputs: &'a [String], params: SummaryParams)
    -> ModelFuture<'a>;
}

/// Split text on blank lines and keep the paragraphs worth summarizing.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(String::from)
        .collect()
}

pub struct Summarizer {
    model: Arc<dyn SummaryModel>,
    params: SummaryParams,
    batch_size: usize,
    /// Shared admission control for model calls across concurrent runs.
    permits: Arc<Semaphore>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn SummaryModel>, config: &Config) -> Self {
        Self {
            model,
            params: config.summary_params(),
            batch_size: config.batch_size.max(1),
            permits: Arc::new(Semaphore::new(config.model_concurrency.max(1))),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Summarize arbitrary text. Never returns an empty string.
    pub async fn summarize(&self, text: &str) -> String {
        let paragraphs = split_paragraphs(text);
        if paragraphs.is_empty() {
            tracing::debug!("no paragraph above threshold, skipping model call");
            return SUMMARY_PLACEHOLDER.to_string();
        }

        match self.run_model(&paragraphs).await {
            Ok(summaries) => {
                let joined = summaries
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined.is_empty() {
                    SUMMARY_PLACEHOLDER.to_string()
                } else {
                    joined
                }
            }
            Err(e) => {
                tracing::warn!(model = self.model.name(), error = %e, "summarization failed");
                SUMMARY_PLACEHOLDER.to_string()
            }
        }
    }

    /// Cross-item synthesis: summarize the concatenation of item summaries.
    pub async fn synthesize(&self, summaries: &[String]) -> String {
        self.summarize(&summaries.join(" ")).await
    }

    async fn run_model(&self, paragraphs: &[String]) -> Result<Vec<String>, ModelError> {
        let mut out = Vec::with_capacity(paragraphs.len());
        for batch in paragraphs.chunks(self.batch_size) {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| ModelError::Other(e.to_string()))?;
            let summaries = self.model.summarize_batch(batch, self.params).await?;
            if summaries.len() != batch.len() {
                return Err(ModelError::CountMismatch {
                    expected: batch.len(),
                    got: summaries.len(),
                });
            }
            out.extend(summaries);
        }
        Ok(out)
    }
}
