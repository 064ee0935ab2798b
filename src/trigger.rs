use crate::indicators::{RSI_WINDOW, rsi_series};
use crate::market_data::PriceSeries;

/// Latest RSI below this fires the oversold condition.
pub const OVERSOLD_LEVEL: f64 = 30.0;
/// A one-bar RSI drop bigger than this fires on its own, no matter the level.
pub const FAST_DROP_DELTA: f64 = 25.0;
/// RSI warm-up plus two defined samples for the delta comparison.
pub const MIN_BARS: usize = RSI_WINDOW + 2;

/// Produced only when a ticker trips the alert condition. RSI values are
/// rounded to two decimals for presentation; the comparison itself runs at
/// full precision.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiTrigger {
    pub ticker: String,
    pub rsi_now: f64,
    pub rsi_prev: f64,
}

/// Applies the alert policy to a price series. Pure: same series in, same
/// answer out. Too-short series and series without two defined RSI samples
/// are "no signal", not errors.
pub fn evaluate(ticker: &str, series: &PriceSeries) -> Option<RsiTrigger> {
    if series.len() < MIN_BARS {
        return None;
    }

    let closes: Vec<f64> = series.iter().map(|bar| bar.close).collect();
    let rsi: Vec<f64> = rsi_series(&closes, RSI_WINDOW)
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect();
    if rsi.len() < 2 {
        return None;
    }

    let now = rsi[rsi.len() - 1];
    let prev = rsi[rsi.len() - 2];

    if now < OVERSOLD_LEVEL || (prev - now) > FAST_DROP_DELTA {
        Some(RsiTrigger {
            ticker: ticker.to_string(),
            rsi_now: round2(now),
            rsi_prev: round2(prev),
        })
    } else {
        None
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
