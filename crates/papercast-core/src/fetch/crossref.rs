use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::rate_limit::{self, RateLimiters};

pub const DEFAULT_CROSSREF_URL: &str = "https://api.crossref.org";

/// Paragraph wrapper tags CrossRef embeds in JATS abstracts.
const ABSTRACT_WRAPPERS: [&str; 2] = ["<jats:p>", "</jats:p>"];

/// Bibliographic metadata for a DOI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub journal: String,
    /// Year of print publication.
    pub date: Option<i32>,
    pub link: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl Metadata {
    /// Parse the `message` object of a CrossRef `/works/{doi}` response.
    pub fn from_message(message: &serde_json::Value) -> Self {
        let first_str = |key: &str| {
            message[key]
                .as_array()
                .and_then(|a| a.first())
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let authors = message["author"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        a["family"]
                            .as_str()
                            .or_else(|| a["name"].as_str())
                            .map(String::from)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let date = message["published-print"]["date-parts"][0][0]
            .as_i64()
            .and_then(|y| i32::try_from(y).ok());

        Self {
            title: first_str("title"),
            authors,
            journal: first_str("container-title"),
            date,
            link: message["URL"].as_str().unwrap_or("").to_string(),
            abstract_text: message["abstract"].as_str().unwrap_or("").to_string(),
        }
    }

    /// Text fed to the summarizer for a DOI item.
    pub fn composite_text(&self) -> String {
        format!(
            "Title: {}\nJournal: {}\nAuthors: {}\n\nAbstract: {}",
            self.title,
            self.journal,
            self.authors.join(", "),
            strip_abstract_markup(&self.abstract_text)
        )
    }
}

/// Remove the registry's paragraph wrapper tags from an abstract.
pub fn strip_abstract_markup(abstract_text: &str) -> String {
    ABSTRACT_WRAPPERS
        .iter()
        .fold(abstract_text.to_string(), |acc, tag| acc.replace(tag, ""))
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("empty DOI")]
    EmptyDoi,
    /// The registry answered with something other than 200.
    #[error("DOI not found (HTTP {status})")]
    NotFound { status: u16 },
    #[error("rate limited by registry (429)")]
    RateLimited,
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed registry response: {0}")]
    Parse(String),
}

/// Looks up DOIs in the CrossRef works registry.
pub struct MetadataResolver {
    base_url: String,
    mailto: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
    limiters: Arc<RateLimiters>,
}

impl MetadataResolver {
    pub fn new(config: &Config, client: reqwest::Client, limiters: Arc<RateLimiters>) -> Self {
        Self {
            base_url: config.crossref_base_url.trim_end_matches('/').to_string(),
            mailto: config.crossref_mailto.clone(),
            timeout: config.http_timeout(),
            client,
            limiters,
        }
    }

    /// Resolve a DOI with one GET. Any non-200 answer is [`ResolveError::NotFound`].
    pub async fn resolve(&self, doi: &str) -> Result<Metadata, ResolveError> {
        let doi = doi.trim();
        if doi.is_empty() {
            return Err(ResolveError::EmptyDoi);
        }

        let url = format!("{}/works/{}", self.base_url, doi);
        self.limiters.crossref.acquire().await;

        tracing::debug!(%url, "resolving DOI");
        let resp = self
            .client
            .get(&url)
            .header(
                reqwest::header::USER_AGENT,
                super::user_agent(self.mailto.as_deref()),
            )
            .timeout(self.timeout)
            .send()
            .await?;

        if rate_limit::is_rate_limited(&resp) {
            self.limiters
                .crossref
                .on_rate_limited(rate_limit::retry_after(resp.headers()));
            return Err(ResolveError::RateLimited);
        }
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(ResolveError::NotFound {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ResolveError::Parse(e.to_string()))?;
        let message = body
            .get("message")
            .ok_or_else(|| ResolveError::Parse("missing \"message\" object".into()))?;

        Ok(Metadata::from_message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver_for(server: &mockito::Server) -> MetadataResolver {
        let config = Config {
            crossref_base_url: server.url(),
            ..Config::default()
        };
        MetadataResolver::new(
            &config,
            reqwest::Client::new(),
            Arc::new(RateLimiters::new(true)),
        )
    }

    #[tokio::test]
    async fn too_many_requests_sets_backoff_from_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/works/10.1/busy")
            .with_status(429)
            .with_header("retry-after", "20")
            .create_async()
            .await;
        let config = Config {
            crossref_base_url: server.url(),
            ..Config::default()
        };
        let limiters = Arc::new(RateLimiters::new(true));
        let resolver = MetadataResolver::new(&config, reqwest::Client::new(), limiters.clone());

        let err = resolver.resolve("10.1/busy").await.unwrap_err();
        assert!(matches!(err, ResolveError::RateLimited));
        assert!(limiters.crossref.backoff_remaining() > std::time::Duration::from_secs(15));
        assert_eq!(limiters.speech.backoff_remaining(), std::time::Duration::ZERO);
    }

    #[test]
    fn message_fields_are_extracted() {
        let message = json!({
            "title": ["Deep Learning"],
            "author": [
                {"given": "Yann", "family": "LeCun"},
                {"given": "Yoshua", "family": "Bengio"},
                {"name": "The Consortium"}
            ],
            "container-title": ["Nature"],
            "published-print": {"date-parts": [[2015, 5, 28]]},
            "URL": "http://dx.doi.org/10.1038/nature14539",
            "abstract": "<jats:p>Deep learning allows models.</jats:p>"
        });
        let meta = Metadata::from_message(&message);
        assert_eq!(meta.title, "Deep Learning");
        assert_eq!(meta.authors, vec!["LeCun", "Bengio", "The Consortium"]);
        assert_eq!(meta.journal, "Nature");
        assert_eq!(meta.date, Some(2015));
        assert_eq!(meta.link, "http://dx.doi.org/10.1038/nature14539");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let meta = Metadata::from_message(&json!({}));
        assert_eq!(meta, Metadata::default());
        assert_eq!(meta.date, None);
    }

    #[test]
    fn composite_text_strips_jats_wrappers() {
        let meta = Metadata {
            title: "T".into(),
            authors: vec!["A".into(), "B".into()],
            journal: "J".into(),
            abstract_text: "<jats:p>First.</jats:p><jats:p>Second.</jats:p>".into(),
            ..Metadata::default()
        };
        assert_eq!(
            meta.composite_text(),
            "Title: T\nJournal: J\nAuthors: A, B\n\nAbstract: First.Second."
        );
    }

    #[test]
    fn other_markup_is_left_alone() {
        assert_eq!(
            strip_abstract_markup("<jats:title>Abstract</jats:title>"),
            "<jats:title>Abstract</jats:title>"
        );
    }

    #[tokio::test]
    async fn resolves_successful_lookup() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works/10.1000/test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "ok",
                    "message": {
                        "title": ["CrossRef Title"],
                        "author": [{"given": "Ada", "family": "Lovelace"}],
                        "container-title": ["Journal of Testing"],
                        "published-print": {"date-parts": [[2021, 6, 1]]}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let meta = resolver_for(&server).resolve("10.1000/test").await.unwrap();
        assert_eq!(meta.title, "CrossRef Title");
        assert_eq!(meta.authors, vec!["Lovelace"]);
        assert_eq!(meta.date, Some(2021));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_yields_not_found_marker() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/works/10.9999/missing")
            .with_status(404)
            .with_body("Resource not found.")
            .create_async()
            .await;

        let err = resolver_for(&server)
            .resolve("10.9999/missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { status: 404 }));
    }

    #[tokio::test]
    async fn missing_message_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/works/10.1000/odd")
            .with_status(200)
            .with_body("{\"status\": \"ok\"}")
            .create_async()
            .await;

        let err = resolver_for(&server).resolve("10.1000/odd").await.unwrap_err();
        assert!(matches!(err, ResolveError::Parse(_)));
    }

    #[tokio::test]
    async fn empty_doi_is_rejected_without_request() {
        let server = mockito::Server::new_async().await;
        let err = resolver_for(&server).resolve("  ").await.unwrap_err();
        assert!(matches!(err, ResolveError::EmptyDoi));
    }
}
