//! In-process test doubles for the model, speech engine and PDF backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{BackendError, PdfBackend};
use crate::speech::{SpeechEngine, SpeechError, SpeechFuture};
use crate::summarize::{ModelError, ModelFuture, SummaryModel, SummaryParams};

/// What a [`MockModel`] returns for each input.
#[derive(Clone, Debug)]
pub enum MockModelBehavior {
    /// Each summary is the input itself.
    Echo,
    /// Each summary is the first whitespace-separated word of its input.
    FirstWord,
    /// Every summary is this string.
    Fixed(String),
    /// Every call fails.
    Fail,
}

/// A hand-rolled [`SummaryModel`] that counts calls.
pub struct MockModel {
    behavior: MockModelBehavior,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new(behavior: MockModelBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            call_count: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Set simulated inference latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of batch calls received so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every paragraph the model has seen, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl SummaryModel for MockModel {
    fn name(&self) -> &str {
        "mock-model"
    }

    fn summarize_batch<'a>(
        &'a self,
        inputs: &'a [String],
        _params: SummaryParams,
    ) -> ModelFuture<'a> {
        Box::pin(async move {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.inputs.lock() {
                seen.extend(inputs.iter().cloned());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let out = inputs.iter().map(|input| match &self.behavior {
                MockModelBehavior::Echo => Ok(input.clone()),
                MockModelBehavior::FirstWord => {
                    Ok(input.split_whitespace().next().unwrap_or("").to_string())
                }
                MockModelBehavior::Fixed(s) => Ok(s.clone()),
                MockModelBehavior::Fail => Err(ModelError::Other("mock model failure".into())),
            });
            out.collect::<Result<Vec<String>, ModelError>>()
        })
    }
}

/// A [`SpeechEngine`] returning `MP3:<text>` as audio bytes.
#[derive(Default)]
pub struct MockSpeech {
    fail: bool,
    spoken: Mutex<Vec<String>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose every call fails with HTTP 503.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl SpeechEngine for MockSpeech {
    fn name(&self) -> &str {
        "mock-speech"
    }

    fn synthesize<'a>(&'a self, text: &'a str, _lang: &'a str) -> SpeechFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(SpeechError::Status { status: 503 });
            }
            if let Ok(mut spoken) = self.spoken.lock() {
                spoken.push(text.to_string());
            }
            Ok(format!("MP3:{text}").into_bytes())
        })
    }
}

/// A [`PdfBackend`] serving canned text per path; unknown paths fail to open.
#[derive(Default)]
pub struct MockPdf {
    texts: HashMap<PathBuf, String>,
}

impl MockPdf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.texts.insert(path.into(), text.into());
        self
    }
}

impl PdfBackend for MockPdf {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        self.texts
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::OpenError(format!("no such document: {}", path.display())))
    }
}
