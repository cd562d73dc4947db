use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::Config;

static PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("static selector is valid"));

/// Fetches a web page and keeps only its paragraph text.
pub struct WebScraper {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebScraper {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: config.scrape_timeout(),
        }
    }

    /// Text of every `<p>` element joined by newlines.
    ///
    /// Never fails: any error is logged and yields an empty string, which the
    /// summarizer then turns into its placeholder.
    pub async fn fetch_text(&self, url: &str) -> String {
        match self.try_fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%url, error = %e, "failed to fetch URL");
                String::new()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, super::user_agent(None))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(%url, %status, "non-success status, parsing body anyway");
        }

        let body = resp.text().await.map_err(|e| e.to_string())?;

        // Parse off the async workers; scraper's DOM types are not Send.
        tokio::task::spawn_blocking(move || paragraph_text(&body))
            .await
            .map_err(|e| e.to_string())
    }
}

/// Extract and join the text of all paragraph elements in an HTML document.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&PARAGRAPH)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper_with_timeout(secs: u64) -> WebScraper {
        let config = Config {
            scrape_timeout_secs: secs,
            ..Config::default()
        };
        WebScraper::new(&config, reqwest::Client::new())
    }

    #[test]
    fn joins_paragraphs_with_newlines() {
        let html = "<html><body><h1>Heading</h1><p>First <b>bold</b> part.</p>\
                    <div><p>Second.</p></div><span>ignored</span></body></html>";
        assert_eq!(paragraph_text(html), "First bold part.\nSecond.");
    }

    #[test]
    fn page_without_paragraphs_is_empty() {
        assert_eq!(paragraph_text("<html><body><div>x</div></body></html>"), "");
    }

    #[tokio::test]
    async fn fetches_paragraphs_from_server() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/abs/2301.12345")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Alpha</p><p>Beta</p>")
            .create_async()
            .await;

        let text = scraper_with_timeout(10)
            .fetch_text(&format!("{}/abs/2301.12345", server.url()))
            .await;
        assert_eq!(text, "Alpha\nBeta");
    }

    #[tokio::test]
    async fn unreachable_host_yields_empty_string() {
        // Port 9 on localhost is the discard service; nothing listens there in CI.
        let text = scraper_with_timeout(1)
            .fetch_text("http://127.0.0.1:9/paper")
            .await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn malformed_url_yields_empty_string() {
        let text = scraper_with_timeout(1).fetch_text("not a url").await;
        assert_eq!(text, "");
    }
}
