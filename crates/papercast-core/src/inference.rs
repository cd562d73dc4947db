use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::Config;
use crate::summarize::{ModelError, ModelFuture, SummaryModel, SummaryParams};

pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_SUMMARY_MODEL: &str = "sshleifer/distilbart-cnn-12-6";

/// Model loading on a cold inference endpoint can take a while.
const INFERENCE_TIMEOUT_FLOOR: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct SummaryOutput {
    summary_text: String,
}

/// Summarization model served by a hosted inference endpoint.
pub struct InferenceApiModel {
    endpoint: String,
    model: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl InferenceApiModel {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let base = config.summary_api_url.trim_end_matches('/');
        Self {
            endpoint: format!("{}/models/{}", base, config.summary_model),
            model: config.summary_model.clone(),
            token: config.summary_api_token.clone(),
            timeout: config.http_timeout().max(INFERENCE_TIMEOUT_FLOOR),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SummaryModel for InferenceApiModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn summarize_batch<'a>(
        &'a self,
        inputs: &'a [String],
        params: SummaryParams,
    ) -> ModelFuture<'a> {
        Box::pin(async move {
            let body = json!({
                "inputs": inputs,
                "parameters": {
                    "max_length": params.max_length,
                    "min_length": params.min_length,
                    "truncation": true,
                },
                "options": { "wait_for_model": true },
            });

            let mut req = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&body);
            if let Some(ref token) = self.token {
                req = req.bearer_auth(token);
            }

            tracing::debug!(endpoint = %self.endpoint, batch = inputs.len(), "calling summarization model");
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ModelError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let outputs: Vec<SummaryOutput> = resp
                .json()
                .await
                .map_err(|e| ModelError::Malformed(e.to_string()))?;
            Ok(outputs.into_iter().map(|o| o.summary_text).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn model_for(server: &mockito::Server, token: Option<&str>) -> InferenceApiModel {
        let config = Config {
            summary_api_url: server.url(),
            summary_model: "org/summarizer".into(),
            summary_api_token: token.map(String::from),
            ..Config::default()
        };
        InferenceApiModel::new(&config, reqwest::Client::new())
    }

    #[tokio::test]
    async fn posts_batch_and_reads_summaries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/org/summarizer")
            .match_header("authorization", "Bearer hf_test")
            .match_body(Matcher::PartialJson(json!({
                "inputs": ["first paragraph", "second paragraph"],
                "parameters": {"max_length": 200, "min_length": 50, "truncation": true},
                "options": {"wait_for_model": true}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"summary_text": "one"}, {"summary_text": "two"}]"#)
            .create_async()
            .await;

        let model = model_for(&server, Some("hf_test"));
        let inputs = vec!["first paragraph".to_string(), "second paragraph".to_string()];
        let out = model
            .summarize_batch(&inputs, SummaryParams::default())
            .await
            .unwrap();
        assert_eq!(out, vec!["one", "two"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/org/summarizer")
            .with_status(503)
            .with_body(r#"{"error": "Model is loading"}"#)
            .create_async()
            .await;

        let inputs = vec!["text".to_string()];
        let err = model_for(&server, None)
            .summarize_batch(&inputs, SummaryParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/org/summarizer")
            .with_status(200)
            .with_body(r#"{"generated_text": "nope"}"#)
            .create_async()
            .await;

        let inputs = vec!["text".to_string()];
        let err = model_for(&server, None)
            .summarize_batch(&inputs, SummaryParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let config = Config {
            summary_api_url: "http://localhost:8080/".into(),
            ..Config::default()
        };
        let model = InferenceApiModel::new(&config, reqwest::Client::new());
        assert_eq!(
            model.endpoint(),
            "http://localhost:8080/models/sshleifer/distilbart-cnn-12-6"
        );
    }
}
