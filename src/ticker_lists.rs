use std::path::Path;

use anyhow::Context;
use regex::Regex;
use tracing::warn;

/// Symbols as Yahoo knows them: letters/digits plus the exchange-suffix and
/// share-class separators ("AIR.PA", "BRK-B").
const SYMBOL_PATTERN: &str = r"^[A-Z0-9][A-Z0-9.\-]{0,11}$";

/// Loads a ticker list file: one symbol per line, case-insensitive, blank
/// lines ignored. Symbols are upper-cased and de-duplicated; first-seen
/// order is kept so batches iterate deterministically.
pub fn load_tickers(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read ticker list {}", path.display()))?;

    let symbol_re = Regex::new(SYMBOL_PATTERN).expect("symbol pattern is valid");

    let mut tickers = Vec::new();
    for line in content.lines() {
        let symbol = line.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !symbol_re.is_match(&symbol) {
            warn!(file = %path.display(), line, "skipping malformed ticker symbol");
            continue;
        }
        if !tickers.contains(&symbol) {
            tickers.push(symbol);
        }
    }

    Ok(tickers)
}

/// Union of several lists, preserving first-seen order across them.
pub fn merge_tickers(lists: Vec<Vec<String>>) -> Vec<String> {
    let mut merged = Vec::new();
    for list in lists {
        for symbol in list {
            if !merged.contains(&symbol) {
                merged.push(symbol);
            }
        }
    }
    merged
}
