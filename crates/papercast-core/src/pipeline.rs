//! The orchestrator: fans items out to the worker pool, joins their results in
//! input order and produces the cross-item synthesis.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::PdfBackend;
use crate::fetch::crossref::MetadataResolver;
use crate::fetch::scrape::WebScraper;
use crate::inference::InferenceApiModel;
use crate::output::OutputDir;
use crate::pool::{ItemJob, ItemPool, ItemResult};
use crate::rate_limit::RateLimiters;
use crate::speech::{AudioSynthesizer, SpeechEngine, TranslateTts};
use crate::summarize::{SummaryModel, Summarizer};
use crate::topic::{SubstringClassifier, TopicClassifier};
use crate::{
    CitationRecord, Config, InputItem, PipelineError, PipelineRequest, PipelineResult,
    ProgressEvent,
};

/// What a completed item contributes to the run.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub summary: String,
    pub citation: CitationRecord,
}

/// An item's audio name plus its place among items of the same run sharing it.
///
/// Items with the same name write their audio in input order, so the last
/// one in the request owns the file.
pub struct AudioTurn {
    name: String,
    earlier: Vec<CancellationToken>,
    _done: DropGuard,
}

impl AudioTurn {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves once every earlier item with this name has finished or been dropped.
    async fn wait(&self) {
        for token in &self.earlier {
            token.cancelled().await;
        }
    }
}

fn audio_turns(output: &OutputDir, items: &[InputItem]) -> Vec<AudioTurn> {
    let mut groups: HashMap<String, Vec<CancellationToken>> = HashMap::new();
    items
        .iter()
        .map(|item| {
            let name = output.audio_name(item);
            let done = CancellationToken::new();
            let group = groups.entry(name.clone()).or_default();
            let earlier = group.clone();
            group.push(done.clone());
            AudioTurn {
                name,
                earlier,
                _done: done.drop_guard(),
            }
        })
        .collect()
}

/// Every collaborator a run needs, built once and shared by `Arc`.
pub struct PipelineContext {
    pub config: Config,
    pub output: OutputDir,
    pdf: Arc<dyn PdfBackend>,
    resolver: MetadataResolver,
    scraper: WebScraper,
    summarizer: Summarizer,
    classifier: Arc<dyn TopicClassifier>,
    audio: AudioSynthesizer,
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl PipelineContext {
    /// Context with explicit model, speech engine and classifier.
    pub fn new(
        config: Config,
        pdf: Arc<dyn PdfBackend>,
        model: Arc<dyn SummaryModel>,
        speech: Arc<dyn SpeechEngine>,
        classifier: Arc<dyn TopicClassifier>,
    ) -> Self {
        let limiters = Arc::new(RateLimiters::new(config.crossref_mailto.is_some()));
        Self::assemble(config, http_client(), limiters, pdf, model, speech, classifier)
    }

    /// Context using the hosted inference model, translate TTS and substring topics.
    pub fn with_defaults(config: Config, pdf: Arc<dyn PdfBackend>) -> Self {
        let client = http_client();
        let limiters = Arc::new(RateLimiters::new(config.crossref_mailto.is_some()));
        let model = Arc::new(InferenceApiModel::new(&config, client.clone()));
        let speech = Arc::new(TranslateTts::new(&config, client.clone(), limiters.clone()));
        Self::assemble(
            config,
            client,
            limiters,
            pdf,
            model,
            speech,
            Arc::new(SubstringClassifier),
        )
    }

    fn assemble(
        config: Config,
        client: reqwest::Client,
        limiters: Arc<RateLimiters>,
        pdf: Arc<dyn PdfBackend>,
        model: Arc<dyn SummaryModel>,
        speech: Arc<dyn SpeechEngine>,
        classifier: Arc<dyn TopicClassifier>,
    ) -> Self {
        let output = OutputDir::new(config.output_dir.clone(), config.naming);
        Self {
            resolver: MetadataResolver::new(&config, client.clone(), limiters),
            scraper: WebScraper::new(&config, client),
            summarizer: Summarizer::new(model, &config),
            audio: AudioSynthesizer::new(speech, output.clone(), config.lang.clone()),
            output,
            pdf,
            classifier,
            config,
        }
    }

    async fn extract_pdf(&self, path: &std::path::Path) -> Result<String, PipelineError> {
        let pdf = self.pdf.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || pdf.extract_text(&owned))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(|source| PipelineError::Pdf {
                path: path.display().to_string(),
                source,
            })
    }
}

/// Process one item end to end. Soft failures skip the item; hard ones are returned.
pub(crate) async fn process_item(
    ctx: &PipelineContext,
    item: &InputItem,
    index: usize,
    total: usize,
    topics: &[String],
    turn: AudioTurn,
    progress: &(dyn Fn(ProgressEvent) + Send + Sync),
) -> ItemResult {
    progress(ProgressEvent::ItemStarted {
        index,
        total,
        item: item.clone(),
    });
    let locator = item.locator();
    tracing::info!(kind = item.kind(), %locator, "processing item");

    let text = match item {
        InputItem::Pdf(path) => ctx.extract_pdf(path).await?,
        InputItem::Doi(doi) => match ctx.resolver.resolve(doi).await {
            Ok(metadata) => metadata.composite_text(),
            Err(e) => {
                tracing::warn!(%doi, error = %e, "skipping unresolvable DOI");
                progress(ProgressEvent::ItemSkipped {
                    index,
                    total,
                    item: item.clone(),
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        },
        InputItem::Url(url) => ctx.scraper.fetch_text(url).await,
    };

    let summary = ctx.summarizer.summarize(&text).await;
    let topic = ctx.classifier.classify(&summary, topics);
    turn.wait().await;
    let audio = ctx.audio.synthesize(&summary, turn.name()).await?;
    drop(turn);

    let citation = CitationRecord {
        source: locator,
        topic,
        audio: audio.display().to_string(),
    };
    progress(ProgressEvent::ItemCompleted {
        index,
        total,
        citation: citation.clone(),
    });
    Ok(Some(ItemReport { summary, citation }))
}

/// Runs requests against a shared context.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Process every item of `request` and synthesize across the results.
    ///
    /// Citations come back in input order. The first hard failure in input
    /// order aborts the run and cancels the items still queued.
    pub async fn run(
        &self,
        request: &PipelineRequest,
        progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
        cancel: CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let items = request.items();
        let total = items.len();
        if total == 0 {
            progress(ProgressEvent::Finished { citations: 0 });
            return Ok(PipelineResult::default());
        }

        let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);
        let topics = Arc::new(request.topic_list.clone());
        let run_cancel = cancel.child_token();
        let pool = ItemPool::new(
            self.ctx.clone(),
            run_cancel.clone(),
            self.ctx.config.num_workers,
        );

        let turns = audio_turns(&self.ctx.output, &items);
        let mut receivers = Vec::with_capacity(total);
        for ((index, item), turn) in items.iter().enumerate().zip(turns) {
            let (result_tx, result_rx) = oneshot::channel();
            pool.submit(ItemJob {
                item: item.clone(),
                index,
                total,
                topics: topics.clone(),
                turn,
                result_tx,
                progress: progress.clone(),
            })
            .await;
            receivers.push(result_rx);
        }

        let mut reports = Vec::with_capacity(total);
        let mut failure = None;
        for rx in receivers {
            let outcome = rx
                .await
                .unwrap_or_else(|_| Err(PipelineError::Task("worker dropped a job".into())));
            match outcome {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    run_cancel.cancel();
                    break;
                }
            }
        }
        pool.shutdown().await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Some(e) = failure {
            tracing::error!(error = %e, "run aborted");
            return Err(e);
        }

        let citations: Vec<CitationRecord> = reports.iter().map(|r| r.citation.clone()).collect();
        if reports.is_empty() {
            progress(ProgressEvent::Finished { citations: 0 });
            return Ok(PipelineResult {
                citations,
                ..PipelineResult::default()
            });
        }

        progress(ProgressEvent::Synthesizing {
            summaries: reports.len(),
        });
        let summaries: Vec<String> = reports.into_iter().map(|r| r.summary).collect();
        let synthesis = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            s = self.ctx.summarizer.synthesize(&summaries) => s,
        };

        let locators: Vec<String> = citations.iter().map(|c| c.source.clone()).collect();
        let name = self.ctx.output.synthesis_name(&locators);
        let audio = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            a = self.ctx.audio.synthesize(&synthesis, &name) => a?,
        };

        progress(ProgressEvent::Finished {
            citations: citations.len(),
        });
        Ok(PipelineResult {
            synthesis,
            synthesis_audio: Some(audio.display().to_string()),
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockModel, MockModelBehavior, MockPdf, MockSpeech};
    use crate::output::AudioNaming;
    use std::sync::Mutex;

    fn long_text(tag: &str) -> String {
        format!("{tag} {}", "content about the paper ".repeat(6))
    }

    fn context(
        dir: &std::path::Path,
        pdf: MockPdf,
        speech: impl SpeechEngine + 'static,
    ) -> Arc<PipelineContext> {
        let config = Config {
            output_dir: dir.to_path_buf(),
            naming: AudioNaming::Locator,
            num_workers: 3,
            ..Config::default()
        };
        Arc::new(PipelineContext::new(
            config,
            Arc::new(pdf),
            Arc::new(MockModel::new(MockModelBehavior::FirstWord)),
            Arc::new(speech),
            Arc::new(SubstringClassifier),
        ))
    }

    #[tokio::test]
    async fn empty_request_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let pipeline = Pipeline::new(context(&out, MockPdf::new(), MockSpeech::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let result = pipeline
            .run(
                &PipelineRequest::default(),
                move |e| sink.lock().unwrap().push(e),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, PipelineResult::default());
        assert!(!out.exists());
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [ProgressEvent::Finished { citations: 0 }]
        ));
    }

    /// Slow, large audio for "alpha"; fast, small audio for anything else.
    struct UnevenSpeech;

    impl SpeechEngine for UnevenSpeech {
        fn name(&self) -> &str {
            "uneven"
        }

        fn synthesize<'a>(
            &'a self,
            text: &'a str,
            _lang: &'a str,
        ) -> crate::speech::SpeechFuture<'a> {
            Box::pin(async move {
                if text == "alpha" {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok(vec![b'A'; 64 * 1024])
                } else {
                    Ok(text.as_bytes().to_vec())
                }
            })
        }
    }

    #[tokio::test]
    async fn shared_audio_name_is_owned_by_last_item() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new()
            .with_text("a/paper.pdf", long_text("alpha"))
            .with_text("b/paper.pdf", long_text("beta"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, UnevenSpeech));
        let request = PipelineRequest {
            pdf_files: vec!["a/paper.pdf".into(), "b/paper.pdf".into()],
            ..Default::default()
        };

        let result = pipeline
            .run(&request, |_| {}, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.citations[0].audio, result.citations[1].audio);
        let written = std::fs::read(tmp.path().join("paper.mp3")).unwrap();
        assert_eq!(written, b"beta");
    }

    #[test]
    fn audio_turns_chain_only_shared_names() {
        let tmp = tempfile::tempdir().unwrap();
        let output = OutputDir::new(tmp.path(), AudioNaming::Locator);
        let items = vec![
            InputItem::Pdf("a/paper.pdf".into()),
            InputItem::Doi("10.1/x".into()),
            InputItem::Pdf("b/paper.pdf".into()),
            InputItem::Pdf("c/paper.pdf".into()),
        ];
        let turns = audio_turns(&output, &items);
        let waits: Vec<_> = turns.iter().map(|t| t.earlier.len()).collect();
        assert_eq!(waits, vec![0, 0, 1, 2]);
        assert_eq!(turns[3].name(), "paper");
    }

    #[tokio::test]
    async fn citations_follow_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new()
            .with_text("a.pdf", long_text("apple"))
            .with_text("b.pdf", long_text("banana"))
            .with_text("c.pdf", long_text("cherry"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, MockSpeech::new()));
        let request = PipelineRequest {
            pdf_files: vec!["a.pdf".into(), "b.pdf".into(), "c.pdf".into()],
            topic_list: vec!["banana".into(), "apple".into()],
            ..Default::default()
        };

        let result = pipeline
            .run(&request, |_| {}, CancellationToken::new())
            .await
            .unwrap();
        let sources: Vec<_> = result.citations.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(result.citations[0].topic, "apple");
        assert_eq!(result.citations[1].topic, "banana");
        // Three one-word summaries are too short to summarize again.
        assert_eq!(result.synthesis, crate::SUMMARY_PLACEHOLDER);
        assert!(tmp.path().join("final_synthesis.mp3").exists());
    }

    #[tokio::test]
    async fn pdf_failure_aborts_run() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new().with_text("ok.pdf", long_text("fine"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, MockSpeech::new()));
        let request = PipelineRequest {
            pdf_files: vec!["ok.pdf".into(), "broken.pdf".into()],
            ..Default::default()
        };
        let err = pipeline
            .run(&request, |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Pdf { ref path, .. } if path == "broken.pdf"));
    }

    #[tokio::test]
    async fn speech_failure_is_hard() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new().with_text("a.pdf", long_text("x"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, MockSpeech::failing()));
        let request = PipelineRequest {
            pdf_files: vec!["a.pdf".into()],
            ..Default::default()
        };
        let err = pipeline
            .run(&request, |_| {}, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Speech(_)));
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new().with_text("a.pdf", long_text("x"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, MockSpeech::new()));
        let request = PipelineRequest {
            pdf_files: vec!["a.pdf".into()],
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.run(&request, |_| {}, cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn progress_reports_each_item() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = MockPdf::new()
            .with_text("a.pdf", long_text("a"))
            .with_text("b.pdf", long_text("b"));
        let pipeline = Pipeline::new(context(tmp.path(), pdf, MockSpeech::new()));
        let request = PipelineRequest {
            pdf_files: vec!["a.pdf".into(), "b.pdf".into()],
            ..Default::default()
        };

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        pipeline
            .run(
                &request,
                move |e| sink.lock().unwrap().push(e),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let completed = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ItemCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Finished { citations: 2 })
        ));
    }
}
