use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::batch;
use crate::config::{ALL_COMMAND, BotConfig, UNIVERSES};
use crate::pipeline::Screen;
use crate::telegram::{Notifier, TelegramClient};
use crate::ticker_lists;

/// Long-poll command loop. Each `/rsi_*` command acknowledges, scans its
/// universe, reports the triggered count back to the issuing chat, and
/// finally sweeps the plot directory.
pub async fn run_command_loop<S: Screen>(
    config: &BotConfig,
    telegram: &TelegramClient,
    screener: &S,
) -> anyhow::Result<()> {
    info!("command loop started");
    let mut offset = 0i64;

    loop {
        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text.as_deref() else {
                continue;
            };
            let Some(command) = parse_command(text) else {
                continue;
            };

            let reply_chat = message.chat.id.to_string();
            dispatch(config, telegram, screener, command, &reply_chat).await;
        }
    }
}

async fn dispatch<S: Screen>(
    config: &BotConfig,
    telegram: &TelegramClient,
    screener: &S,
    command: &str,
    reply_chat: &str,
) {
    if command == ALL_COMMAND {
        scan_all_universes(config, telegram, screener, reply_chat).await;
        sweep_plots(&config.plot_dir);
        return;
    }

    if let Some(universe) = UNIVERSES.iter().find(|u| u.command == command) {
        let list_path = config.ticker_list_dir.join(universe.file);
        scan_universe(telegram, screener, reply_chat, universe.label, &list_path).await;
        sweep_plots(&config.plot_dir);
    }
    // Anything else in the chat is simply not for us.
}

/// Scans one universe and reports back. Returns the triggered count.
async fn scan_universe<S: Screen>(
    telegram: &TelegramClient,
    screener: &S,
    reply_chat: &str,
    label: &str,
    list_path: &Path,
) -> usize {
    reply(
        telegram,
        reply_chat,
        &format!("Running RSI check for {label}..."),
    )
    .await;

    let tickers = match ticker_lists::load_tickers(list_path) {
        Ok(tickers) => tickers,
        Err(err) => {
            warn!(error = %err, "could not load ticker list");
            reply(
                telegram,
                reply_chat,
                &format!("Could not load the {label} ticker list."),
            )
            .await;
            return 0;
        }
    };

    let count = batch::run_batch(screener, &tickers).await;

    reply(
        telegram,
        reply_chat,
        &format!("\u{2705} Done! {count} tickers in {label} met the criteria."),
    )
    .await;

    count
}

async fn scan_all_universes<S: Screen>(
    config: &BotConfig,
    telegram: &TelegramClient,
    screener: &S,
    reply_chat: &str,
) -> usize {
    reply(
        telegram,
        reply_chat,
        "Running RSI check for all universes...",
    )
    .await;

    let mut lists = Vec::new();
    for universe in UNIVERSES {
        let list_path = config.ticker_list_dir.join(universe.file);
        match ticker_lists::load_tickers(&list_path) {
            Ok(tickers) => lists.push(tickers),
            Err(err) => {
                warn!(universe = universe.label, error = %err, "skipping unreadable ticker list");
            }
        }
    }
    let tickers = ticker_lists::merge_tickers(lists);

    let count = batch::run_batch(screener, &tickers).await;

    reply(
        telegram,
        reply_chat,
        &format!("\u{2705} Done! {count} tickers across all lists met the criteria."),
    )
    .await;

    count
}

/// Acknowledgments are courtesy, not contract: a failed reply never stops a
/// scan.
async fn reply(telegram: &TelegramClient, chat: &str, text: &str) {
    if let Err(err) = telegram.send_text(chat, text).await {
        warn!(error = %err, "could not deliver status message");
    }
}

/// Extracts the command name from a message: "/rsi_all@SomeBot now" -> "rsi_all".
fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    if name.is_empty() { None } else { Some(name) }
}

/// Clears rendered charts left behind by a batch. Normally the pipeline has
/// already released its own artifacts; this sweep bounds disk usage even
/// when it could not.
fn sweep_plots(plot_dir: &Path) {
    let entries = match std::fs::read_dir(plot_dir) {
        Ok(entries) => entries,
        // Nothing rendered, nothing to sweep.
        Err(_) => return,
    };

    for entry in entries.flatten() {
        if let Err(err) = std::fs::remove_file(entry.path()) {
            warn!(file = %entry.path().display(), error = %err, "could not remove plot file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ScreenError;
    use async_trait::async_trait;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/rsi_nasdaq"), Some("rsi_nasdaq"));
        assert_eq!(parse_command("/rsi_all now"), Some("rsi_all"));
    }

    #[test]
    fn strips_the_bot_mention() {
        assert_eq!(parse_command("/rsi_dax@ScreenerBot"), Some("rsi_dax"));
    }

    #[test]
    fn ignores_non_commands() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn sweep_clears_plot_files_and_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AAPL_tech_plot.png"), b"png").unwrap();
        std::fs::write(dir.path().join("MSFT_tech_plot.png"), b"png").unwrap();

        sweep_plots(dir.path());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // A directory that never existed is fine too.
        sweep_plots(Path::new("/nonexistent/plots"));
    }

    struct TriggerEverything;

    #[async_trait]
    impl Screen for TriggerEverything {
        async fn run(&self, _ticker: &str) -> Result<bool, ScreenError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn universe_scan_acknowledges_and_summarizes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"ok":true,"result":{"message_id":1}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut list = tempfile::NamedTempFile::new().unwrap();
        list.write_all(b"AAPL\nMSFT\n").unwrap();

        let telegram = TelegramClient::with_base_url(server.uri(), "TESTTOKEN");
        let count =
            scan_universe(&telegram, &TriggerEverything, "99", "Test List", list.path()).await;

        assert_eq!(count, 2);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2, "one ack plus one summary");
        let summary = String::from_utf8_lossy(&requests[1].body).to_string();
        assert!(summary.contains("criteria"));
    }

    #[tokio::test]
    async fn unreadable_list_reports_back_instead_of_crashing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"ok":true,"result":{"message_id":1}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let telegram = TelegramClient::with_base_url(server.uri(), "TESTTOKEN");
        let count = scan_universe(
            &telegram,
            &TriggerEverything,
            "99",
            "Test List",
            Path::new("/nonexistent/list.txt"),
        )
        .await;

        assert_eq!(count, 0);
    }
}
