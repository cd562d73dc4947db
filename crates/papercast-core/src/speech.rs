//! Text-to-speech: engines produce MP3 bytes, the synthesizer writes them out.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::output::{OutputDir, OutputError};
use crate::rate_limit::{self, RateLimiters};
use crate::Config;

pub const DEFAULT_TTS_URL: &str = "https://translate.google.com";
/// The translate TTS endpoint rejects longer `q` values.
pub const MAX_CHUNK_CHARS: usize = 100;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("no text to synthesize")]
    EmptyText,
    #[error("speech request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("speech service returned HTTP {status}")]
    Status { status: u16 },
    #[error("rate limited by speech service (429)")]
    RateLimited,
    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Output(#[from] OutputError),
}

pub type SpeechFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, SpeechError>> + Send + 'a>>;

/// Converts text into MP3 audio.
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    fn synthesize<'a>(&'a self, text: &'a str, lang: &'a str) -> SpeechFuture<'a>;
}

/// Split text into pieces of at most `max` characters, preferring word boundaries.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Google Translate's public TTS endpoint, queried chunk by chunk.
pub struct TranslateTts {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
    limiters: Arc<RateLimiters>,
}

impl TranslateTts {
    pub fn new(config: &Config, client: reqwest::Client, limiters: Arc<RateLimiters>) -> Self {
        Self {
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            timeout: config.http_timeout(),
            client,
            limiters,
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, SpeechError> {
        let url = format!(
            "{}/translate_tts?ie=UTF-8&client=tw-ob&tl={}&q={}&total={}&idx={}&textlen={}",
            self.base_url,
            urlencoding::encode(lang),
            urlencoding::encode(chunk),
            total,
            idx,
            chunk.chars().count()
        );

        self.limiters.speech.acquire().await;
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::fetch::user_agent(None))
            .timeout(self.timeout)
            .send()
            .await?;

        if rate_limit::is_rate_limited(&resp) {
            self.limiters
                .speech
                .on_rate_limited(rate_limit::retry_after(resp.headers()));
            return Err(SpeechError::RateLimited);
        }
        let status = resp.status();
        if !status.is_success() {
            return Err(SpeechError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

impl SpeechEngine for TranslateTts {
    fn name(&self) -> &str {
        "translate-tts"
    }

    fn synthesize<'a>(&'a self, text: &'a str, lang: &'a str) -> SpeechFuture<'a> {
        Box::pin(async move {
            let chunks = chunk_text(text, MAX_CHUNK_CHARS);
            if chunks.is_empty() {
                return Err(SpeechError::EmptyText);
            }
            let total = chunks.len();
            let mut audio = Vec::new();
            // MP3 frames concatenate cleanly.
            for (idx, chunk) in chunks.iter().enumerate() {
                audio.extend(self.fetch_chunk(chunk, lang, idx, total).await?);
            }
            Ok(audio)
        })
    }
}

/// Writes synthesized speech to `<output_dir>/<basename>.mp3`.
pub struct AudioSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    output: OutputDir,
    lang: String,
}

impl AudioSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, output: OutputDir, lang: impl Into<String>) -> Self {
        Self {
            engine,
            output,
            lang: lang.into(),
        }
    }

    /// Synthesize `text` and return the written file's path. `basename` is used verbatim.
    pub async fn synthesize(&self, text: &str, basename: &str) -> Result<PathBuf, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }
        let bytes = self.engine.synthesize(text, &self.lang).await?;
        let len = bytes.len();
        let output = self.output.clone();
        let name = basename.to_string();
        let path = tokio::task::spawn_blocking(move || output.write_audio(&name, &bytes))
            .await
            .map_err(std::io::Error::other)??;

        tracing::info!(path = %path.display(), bytes = len, engine = self.engine.name(), "audio written");
        Ok(path)
    }
}
