use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chart::{self, IndicatorPanels};
use crate::market_data::{MarketData, MarketDataError};
use crate::news::{Headline, NewsSource};
use crate::telegram::Notifier;
use crate::trigger::{self, RsiTrigger};

/// Short, cheap window the trigger check runs on.
pub const TRIGGER_RANGE: &str = "5d";
/// Longer window fetched only for tickers that already fired.
pub const CHART_RANGE: &str = "1mo";
pub const BAR_INTERVAL: &str = "1h";

pub const HEADLINE_COUNT: usize = 3;
pub const NO_NEWS_PLACEHOLDER: &str = "No news found.";

/// Everything that can sink a single ticker's screening. The batch loop
/// pattern-matches these; none of them ever crosses the batch boundary.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("market data for {ticker} unavailable: {source}")]
    MarketData {
        ticker: String,
        #[source]
        source: MarketDataError,
    },
    #[error("chart rendering for {ticker} failed: {source}")]
    Render {
        ticker: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("alert delivery for {ticker} failed: {source}")]
    Notify {
        ticker: String,
        #[source]
        source: anyhow::Error,
    },
}

/// One ticker end-to-end. `Ok(true)` means the alert went out (or was at
/// least attempted past the trigger), `Ok(false)` means checked-no-signal.
#[async_trait]
pub trait Screen: Send + Sync {
    async fn run(&self, ticker: &str) -> Result<bool, ScreenError>;
}

pub struct Screener<M, N, T> {
    market: M,
    news: N,
    notifier: T,
    alert_chat_id: String,
    plot_dir: PathBuf,
}

impl<M, N, T> Screener<M, N, T>
where
    M: MarketData,
    N: NewsSource,
    T: Notifier,
{
    pub fn new(
        market: M,
        news: N,
        notifier: T,
        alert_chat_id: impl Into<String>,
        plot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            market,
            news,
            notifier,
            alert_chat_id: alert_chat_id.into(),
            plot_dir: plot_dir.into(),
        }
    }

    /// Best-effort headlines. Any failure, or an empty result, becomes the
    /// placeholder line; an alert is never lost over news.
    async fn headline_lines(&self, ticker: &str) -> Vec<String> {
        match self.news.latest_headlines(ticker, HEADLINE_COUNT).await {
            Ok(headlines) if !headlines.is_empty() => {
                headlines.iter().map(Headline::to_caption_line).collect()
            }
            Ok(_) => vec![NO_NEWS_PLACEHOLDER.to_string()],
            Err(err) => {
                warn!(ticker, error = %err, "headline fetch failed, using placeholder");
                vec![NO_NEWS_PLACEHOLDER.to_string()]
            }
        }
    }
}

fn compose_caption(trigger: &RsiTrigger, headlines: &[String]) -> String {
    format!(
        "\u{26A0}\u{FE0F} RSI Alert for {} (RSI {}, was {})\n\n{}",
        trigger.ticker,
        trigger.rsi_now,
        trigger.rsi_prev,
        headlines.join("\n\n")
    )
}

#[async_trait]
impl<M, N, T> Screen for Screener<M, N, T>
where
    M: MarketData,
    N: NewsSource,
    T: Notifier,
{
    async fn run(&self, ticker: &str) -> Result<bool, ScreenError> {
        let short = self
            .market
            .fetch(ticker, TRIGGER_RANGE, BAR_INTERVAL)
            .await
            .map_err(|source| ScreenError::MarketData {
                ticker: ticker.to_string(),
                source,
            })?;

        // Cheap check first. A quiet ticker is done here: the long-window
        // fetch and the chart render only happen once a trigger fired.
        let Some(fired) = trigger::evaluate(ticker, &short) else {
            debug!(ticker, bars = short.len(), "no trigger");
            return Ok(false);
        };
        info!(
            ticker,
            rsi_now = fired.rsi_now,
            rsi_prev = fired.rsi_prev,
            "trigger fired"
        );

        let history = self
            .market
            .fetch(ticker, CHART_RANGE, BAR_INTERVAL)
            .await
            .map_err(|source| ScreenError::MarketData {
                ticker: ticker.to_string(),
                source,
            })?;

        let panels = IndicatorPanels::compute(&history);
        let chart_path = chart::render(ticker, &history, &panels, &self.plot_dir).map_err(
            |source| ScreenError::Render {
                ticker: ticker.to_string(),
                source,
            },
        )?;

        let headlines = self.headline_lines(ticker).await;
        let caption = compose_caption(&fired, &headlines);

        let delivery = self
            .notifier
            .send_photo(&self.alert_chat_id, &chart_path, &caption)
            .await;

        // The artifact is owned by this invocation: release it whether or
        // not the delivery went through.
        if let Err(err) = std::fs::remove_file(&chart_path) {
            warn!(ticker, error = %err, "could not remove chart artifact");
        }

        delivery.map_err(|source| ScreenError::Notify {
            ticker: ticker.to_string(),
            source,
        })?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PriceBar, PriceSeries};
    use reqwest::StatusCode;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| PriceBar {
                timestamp: i as i64 * 3600,
                open: *close,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    /// 20 bars: gentle climb, then three hard legs down. Trips the trigger.
    fn firing_series() -> PriceSeries {
        let mut closes: Vec<f64> = (0..17).map(|i| 100.0 + i as f64 * 0.1).collect();
        closes.extend([95.0, 85.0, 70.0]);
        series_from_closes(&closes)
    }

    fn quiet_series() -> PriceSeries {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        series_from_closes(&closes)
    }

    struct StubMarket {
        short: PriceSeries,
        long: PriceSeries,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubMarket {
        fn new(short: PriceSeries, long: PriceSeries) -> Self {
            Self {
                short,
                long,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                short: Vec::new(),
                long: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketData for StubMarket {
        async fn fetch(
            &self,
            _ticker: &str,
            range: &str,
            _interval: &str,
        ) -> Result<PriceSeries, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketDataError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(if range == TRIGGER_RANGE {
                self.short.clone()
            } else {
                self.long.clone()
            })
        }
    }

    struct StubNews {
        fail: bool,
    }

    #[async_trait]
    impl NewsSource for StubNews {
        async fn latest_headlines(
            &self,
            _ticker: &str,
            _count: usize,
        ) -> anyhow::Result<Vec<Headline>> {
            if self.fail {
                anyhow::bail!("news endpoint down");
            }
            Ok(vec![Headline {
                title: "Stock tumbles".to_string(),
                publisher: "Newswire".to_string(),
                published_at: None,
                url: "https://example.com/story".to_string(),
            }])
        }
    }

    #[derive(Default)]
    struct StubNotifier {
        fail: bool,
        sent: Mutex<Vec<SentPhoto>>,
    }

    struct SentPhoto {
        chat_id: String,
        caption: String,
        file_existed: bool,
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        async fn send_text(&self, _chat_id: &str, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_photo(
            &self,
            chat_id: &str,
            photo: &Path,
            caption: &str,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(SentPhoto {
                chat_id: chat_id.to_string(),
                caption: caption.to_string(),
                file_existed: photo.exists(),
            });
            if self.fail {
                anyhow::bail!("telegram unreachable");
            }
            Ok(())
        }
    }

    fn screener(
        market: StubMarket,
        news: StubNews,
        notifier: StubNotifier,
        plot_dir: &Path,
    ) -> Screener<StubMarket, StubNews, StubNotifier> {
        Screener::new(market, news, notifier, "alert-chat", plot_dir)
    }

    fn plot_dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn quiet_ticker_short_circuits_after_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::new(quiet_series(), quiet_series()),
            StubNews { fail: false },
            StubNotifier::default(),
            dir.path(),
        );

        let triggered = screener.run("AAPL").await.unwrap();

        assert!(!triggered);
        assert_eq!(screener.market.calls.load(Ordering::SeqCst), 1);
        assert!(screener.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn insufficient_data_is_no_signal_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::new(series_from_closes(&[100.0, 90.0, 80.0]), quiet_series()),
            StubNews { fail: false },
            StubNotifier::default(),
            dir.path(),
        );

        assert!(!screener.run("AAPL").await.unwrap());
    }

    #[tokio::test]
    async fn triggered_ticker_delivers_chart_and_caption() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::new(firing_series(), firing_series()),
            StubNews { fail: false },
            StubNotifier::default(),
            dir.path(),
        );

        let triggered = screener.run("AAPL").await.unwrap();
        assert!(triggered);

        let sent = screener.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "alert-chat");
        assert!(sent[0].caption.contains("RSI Alert for AAPL"));
        assert!(sent[0].caption.contains("Stock tumbles"));
        assert!(sent[0].file_existed, "chart should exist at delivery time");
        assert!(
            plot_dir_is_empty(dir.path()),
            "artifact should be released after delivery"
        );
    }

    #[tokio::test]
    async fn news_failure_substitutes_the_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::new(firing_series(), firing_series()),
            StubNews { fail: true },
            StubNotifier::default(),
            dir.path(),
        );

        assert!(screener.run("AAPL").await.unwrap());

        let sent = screener.notifier.sent.lock().unwrap();
        assert!(sent[0].caption.contains(NO_NEWS_PLACEHOLDER));
    }

    #[tokio::test]
    async fn failed_delivery_still_releases_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::new(firing_series(), firing_series()),
            StubNews { fail: false },
            StubNotifier {
                fail: true,
                ..Default::default()
            },
            dir.path(),
        );

        let err = screener.run("AAPL").await.unwrap_err();
        assert!(matches!(err, ScreenError::Notify { .. }));
        assert!(plot_dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn market_failures_surface_as_typed_errors() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(
            StubMarket::failing(),
            StubNews { fail: false },
            StubNotifier::default(),
            dir.path(),
        );

        let err = screener.run("AAPL").await.unwrap_err();
        assert!(matches!(err, ScreenError::MarketData { .. }));
    }
}
