mod batch;
mod bot;
mod chart;
mod config;
mod indicators;
mod market_data;
mod news;
mod pipeline;
mod telegram;
mod ticker_lists;
mod trigger;

use config::BotConfig;
use market_data::YahooMarketData;
use news::YahooNews;
use pipeline::Screener;
use telegram::TelegramClient;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Credentials are the only fatal error: a missing token or chat id
    // aborts here, before any screening work begins.
    let config = BotConfig::from_env()?;
    info!(
        ticker_list_dir = %config.ticker_list_dir.display(),
        plot_dir = %config.plot_dir.display(),
        "starting rsi-screener"
    );

    let telegram = TelegramClient::new(config.bot_token.as_str());
    let screener = Screener::new(
        YahooMarketData::new(),
        YahooNews::new(),
        TelegramClient::new(config.bot_token.as_str()),
        config.alert_chat_id.as_str(),
        config.plot_dir.clone(),
    );

    bot::run_command_loop(&config, &telegram, &screener).await
}
