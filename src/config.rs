use std::env;
use std::path::PathBuf;

use anyhow::Context;

/// Process-wide configuration, read from the environment exactly once at
/// startup. Missing credentials abort before any screening work begins.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token used for both the command loop and alert delivery.
    pub bot_token: String,
    /// Chat that receives alert charts. Command acknowledgments go back to
    /// whichever chat issued the command.
    pub alert_chat_id: String,
    /// Directory holding one ticker list file per universe.
    pub ticker_list_dir: PathBuf,
    /// Transient directory for rendered chart images.
    pub plot_dir: PathBuf,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let alert_chat_id = env::var("CHAT_ID").context("CHAT_ID is not set")?;

        let ticker_list_dir = env::var("TICKER_LIST_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ticker_lists"));
        let plot_dir = env::var("PLOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("temp_plots"));

        Ok(Self {
            bot_token,
            alert_chat_id,
            ticker_list_dir,
            plot_dir,
        })
    }
}

/// A named ticker universe: the command that scans it, the label shown in
/// acknowledgments, and the list file it reads.
#[derive(Debug, Clone)]
pub struct Universe {
    pub command: &'static str,
    pub label: &'static str,
    pub file: &'static str,
}

/// Every universe is an independent entry pointing at its own list file, so
/// adding a market is a one-line change here plus a text file.
pub const UNIVERSES: &[Universe] = &[
    Universe {
        command: "rsi_nasdaq",
        label: "NASDAQ-100",
        file: "nasdaq100_tickers.txt",
    },
    Universe {
        command: "rsi_sp500",
        label: "S&P 500",
        file: "sp500_tickers.txt",
    },
    Universe {
        command: "rsi_cac",
        label: "CAC 40",
        file: "cac40_tickers.txt",
    },
    Universe {
        command: "rsi_dax",
        label: "DAX",
        file: "dax_tickers.txt",
    },
];

/// Command that runs every universe back-to-back.
pub const ALL_COMMAND: &str = "rsi_all";
