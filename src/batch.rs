use tracing::{info, warn};

use crate::pipeline::Screen;

/// Runs every ticker through the screening pipeline, strictly one at a time,
/// and returns how many triggered. A failing ticker is logged and counted as
/// not-triggered; it never aborts the rest of the list.
pub async fn run_batch<S: Screen + ?Sized>(screener: &S, tickers: &[String]) -> usize {
    let mut triggered = 0;

    for ticker in tickers {
        match screener.run(ticker).await {
            Ok(true) => triggered += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "screening failed, continuing with the list");
            }
        }
    }

    info!(
        scanned = tickers.len(),
        triggered, "batch scan complete"
    );
    triggered
}
