use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// One headline as delivered in the alert caption.
#[derive(Debug, Clone)]
pub struct Headline {
    pub title: String,
    pub publisher: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl Headline {
    pub fn to_caption_line(&self) -> String {
        let published = self
            .published_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "date unknown".to_string());

        format!(
            "\u{1F4F0} {} \u{2014} {} ({})\n{}",
            self.title, self.publisher, published, self.url
        )
    }
}

/// Headline source. Strictly best-effort: the pipeline substitutes a
/// placeholder on `Err`, it never fails an alert over news.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn latest_headlines(&self, ticker: &str, count: usize)
    -> anyhow::Result<Vec<Headline>>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Deserialize)]
struct NewsItem {
    title: Option<String>,
    publisher: Option<String>,
    link: Option<String>,
    #[serde(rename = "providerPublishTime")]
    provider_publish_time: Option<i64>,
}

pub struct YahooNews {
    client: reqwest::Client,
    base_url: String,
}

impl YahooNews {
    pub fn new() -> Self {
        Self::with_base_url("https://query1.finance.yahoo.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; rsi-screener/0.1)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl Default for YahooNews {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsSource for YahooNews {
    async fn latest_headlines(
        &self,
        ticker: &str,
        count: usize,
    ) -> anyhow::Result<Vec<Headline>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let count_param = count.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", ticker),
                ("newsCount", count_param.as_str()),
                ("quotesCount", "0"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let payload: SearchResponse = response.json().await?;

        let headlines = payload
            .news
            .into_iter()
            .filter_map(|item| {
                Some(Headline {
                    title: item.title?,
                    publisher: item.publisher.unwrap_or_else(|| "unknown".to_string()),
                    published_at: item
                        .provider_publish_time
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    url: item.link.unwrap_or_default(),
                })
            })
            .take(count)
            .collect();

        Ok(headlines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_headlines_and_skips_untitled_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"news":[
                    {"title":"Apple drops","publisher":"Newswire",
                     "link":"https://example.com/a","providerPublishTime":1700000000},
                    {"publisher":"NoTitle Inc","link":"https://example.com/b"},
                    {"title":"Second story","publisher":"Ticker Times",
                     "link":"https://example.com/c","providerPublishTime":1700003600}
                ]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let source = YahooNews::with_base_url(server.uri());
        let headlines = source.latest_headlines("AAPL", 3).await.unwrap();

        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "Apple drops");
        assert_eq!(headlines[1].publisher, "Ticker Times");
    }

    #[tokio::test]
    async fn truncates_to_the_requested_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"news":[
                    {"title":"one"},{"title":"two"},{"title":"three"},{"title":"four"}
                ]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let source = YahooNews::with_base_url(server.uri());
        let headlines = source.latest_headlines("AAPL", 3).await.unwrap();
        assert_eq!(headlines.len(), 3);
    }

    #[tokio::test]
    async fn server_errors_surface_as_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = YahooNews::with_base_url(server.uri());
        assert!(source.latest_headlines("AAPL", 3).await.is_err());
    }

    #[test]
    fn caption_line_carries_title_source_and_url() {
        let headline = Headline {
            title: "Apple drops".to_string(),
            publisher: "Newswire".to_string(),
            published_at: DateTime::from_timestamp(1_700_000_000, 0),
            url: "https://example.com/a".to_string(),
        };

        let line = headline.to_caption_line();
        assert!(line.contains("Apple drops"));
        assert!(line.contains("Newswire"));
        assert!(line.contains("2023-11-14"));
        assert!(line.contains("https://example.com/a"));
    }
}
