use ta::Next;
use ta::indicators::{MovingAverageConvergenceDivergence, RelativeStrengthIndex};

use crate::market_data::PriceBar;

/// Bars the RSI needs before its output means anything.
pub const RSI_WINDOW: usize = 14;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Wilder-style RSI over a close series, aligned one-to-one with the input.
/// The first `window` entries are `None`; only defined values may drive a
/// trigger decision.
pub fn rsi_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut rsi) = RelativeStrengthIndex::new(window) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let value = rsi.next(*close);
            if i < window { None } else { Some(value) }
        })
        .collect()
}

/// MACD line + signal line for the chart panels. Presentational only, so no
/// warm-up masking: the EMAs simply start from the first close.
#[derive(Debug, Clone, Copy)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
}

pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    let Ok(mut macd) = MovingAverageConvergenceDivergence::new(fast, slow, signal) else {
        return Vec::new();
    };

    closes
        .iter()
        .map(|close| {
            let out = macd.next(*close);
            MacdPoint {
                macd: out.macd,
                signal: out.signal,
            }
        })
        .collect()
}

/// On-balance volume: cumulative signed volume over the series. A bar that
/// closes below its predecessor subtracts its volume, any other bar adds it.
pub fn obv_series(bars: &[PriceBar]) -> Vec<f64> {
    let mut obv = 0.0;
    let mut prev_close: Option<f64> = None;

    bars.iter()
        .map(|bar| {
            match prev_close {
                Some(prev) if bar.close < prev => obv -= bar.volume,
                _ => obv += bar.volume,
            }
            prev_close = Some(bar.close);
            obv
        })
        .collect()
}
