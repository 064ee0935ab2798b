use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::prelude::*;

use crate::indicators::{
    self, MACD_FAST, MACD_SIGNAL, MACD_SLOW, MacdPoint, RSI_WINDOW, rsi_series,
};
use crate::market_data::PriceSeries;

/// Presentational indicator columns for the chart, aligned on the bar index.
pub struct IndicatorPanels {
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<MacdPoint>,
    pub obv: Vec<f64>,
}

impl IndicatorPanels {
    pub fn compute(series: &PriceSeries) -> Self {
        let closes: Vec<f64> = series.iter().map(|bar| bar.close).collect();
        Self {
            rsi: rsi_series(&closes, RSI_WINDOW),
            macd: indicators::macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL),
            obv: indicators::obv_series(series),
        }
    }
}

/// Ticker-derived artifact name; distinct tickers never collide within a run.
pub fn chart_file_name(ticker: &str) -> String {
    format!("{ticker}_tech_plot.png")
}

/// Renders the 4-panel alert chart (candles, OBV, MACD, RSI) to a PNG under
/// `out_dir` and returns its path. Panels share the bar index as x axis.
pub fn render(
    ticker: &str,
    series: &PriceSeries,
    panels: &IndicatorPanels,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    anyhow::ensure!(!series.is_empty(), "cannot render an empty series");

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create plot directory {}", out_dir.display()))?;
    let path = out_dir.join(chart_file_name(ticker));

    draw(&path, series, panels)
        .map_err(|e| anyhow::anyhow!("chart rendering for {ticker} failed: {e}"))?;

    Ok(path)
}

const WIDTH: u32 = 1400;
const HEIGHT: u32 = 1000;

// plotters errors are backend-generic; boxing here keeps the drawing code on
// plain `?` and the caller converts once.
fn draw(
    path: &Path,
    series: &PriceSeries,
    panels: &IndicatorPanels,
) -> Result<(), Box<dyn std::error::Error>> {
    let n = series.len() as i32;
    let x_range = -1..n;

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    // Price gets half the canvas, the three indicator panels share the rest.
    let (price_area, rest) = root.split_vertically((HEIGHT / 2) as i32);
    let (obv_area, rest) = rest.split_vertically((HEIGHT / 6) as i32);
    let (macd_area, rsi_area) = rest.split_vertically((HEIGHT / 6) as i32);

    // --- price candles ---
    let (lo, hi) = price_bounds(series);
    let mut price = ChartBuilder::on(&price_area)
        .margin(10)
        .build_cartesian_2d(x_range.clone(), lo..hi)?;
    price.configure_mesh().draw()?;

    let candle_width = (WIDTH / (series.len() as u32 + 2)).saturating_sub(3).max(1);
    price.draw_series(series.iter().enumerate().map(|(i, bar)| {
        CandleStick::new(
            i as i32,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            GREEN.filled(),
            RED.filled(),
            candle_width,
        )
    }))?;

    // --- OBV ---
    let (obv_lo, obv_hi) = value_bounds(panels.obv.iter().copied());
    let mut obv = ChartBuilder::on(&obv_area)
        .margin(10)
        .build_cartesian_2d(x_range.clone(), obv_lo..obv_hi)?;
    obv.configure_mesh().draw()?;
    obv.draw_series(LineSeries::new(
        panels.obv.iter().enumerate().map(|(i, v)| (i as i32, *v)),
        &BLUE,
    ))?;

    // --- MACD + signal ---
    let (macd_lo, macd_hi) = value_bounds(
        panels
            .macd
            .iter()
            .flat_map(|p| [p.macd, p.signal])
            .chain([0.0]),
    );
    let mut macd = ChartBuilder::on(&macd_area)
        .margin(10)
        .build_cartesian_2d(x_range.clone(), macd_lo..macd_hi)?;
    macd.configure_mesh().draw()?;
    macd.draw_series(std::iter::once(PathElement::new(
        vec![(-1, 0.0), (n, 0.0)],
        BLACK.mix(0.4),
    )))?;
    macd.draw_series(LineSeries::new(
        panels.macd.iter().enumerate().map(|(i, p)| (i as i32, p.macd)),
        &MAGENTA,
    ))?;
    macd.draw_series(LineSeries::new(
        panels
            .macd
            .iter()
            .enumerate()
            .map(|(i, p)| (i as i32, p.signal)),
        &CYAN,
    ))?;

    // --- RSI with the 30/70 guides ---
    let mut rsi = ChartBuilder::on(&rsi_area)
        .margin(10)
        .build_cartesian_2d(x_range, 0.0..100.0)?;
    rsi.configure_mesh().draw()?;
    for level in [30.0, 70.0] {
        rsi.draw_series(std::iter::once(PathElement::new(
            vec![(-1, level), (n, level)],
            BLACK.mix(0.4),
        )))?;
    }
    rsi.draw_series(LineSeries::new(
        panels
            .rsi
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i as i32, v))),
        &GREEN,
    ))?;

    root.present()?;
    Ok(())
}

fn price_bounds(series: &PriceSeries) -> (f64, f64) {
    let lo = series.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hi = series
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    pad_bounds(lo, hi)
}

fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    pad_bounds(lo, hi)
}

/// Widens a [lo, hi] pair so flat series still give plotters a non-empty
/// range to draw into.
fn pad_bounds(lo: f64, hi: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let span = (hi - lo).abs();
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad, hi + pad)
}
