//! Momentum and volatility indicators backing the structure sub-score.
//!
//! All functions are windowed over plain price slices and return `None`
//! when there is not enough history, so the scorer can treat "no signal"
//! and "indicator unavailable" identically.

use statrs::statistics::Statistics;

use crate::utils::maths_utils::mean;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Wilder-style RSI over the last `period` deltas.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (closes.len() - period)..closes.len() {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Running EMA series, seeded at the first value. Same length as input.
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);
    for v in &values[1..] {
        ema = (v - ema) * multiplier + ema;
        out.push(ema);
    }
    out
}

/// MACD(12,26,9) histogram series aligned with `closes`. `None` until
/// there is enough history for the slow EMA plus the signal line.
pub fn macd_histogram_series(closes: &[f64]) -> Option<Vec<f64>> {
    if closes.len() < MACD_SLOW + MACD_SIGNAL {
        return None;
    }
    let fast = ema_series(closes, MACD_FAST);
    let slow = ema_series(closes, MACD_SLOW);
    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema_series(&macd_line, MACD_SIGNAL);
    Some(
        macd_line
            .iter()
            .zip(&signal)
            .map(|(m, s)| m - s)
            .collect(),
    )
}

/// Bollinger bands (upper, lower) over the trailing `period` closes.
pub fn bollinger_bands(closes: &[f64], period: usize, width: f64) -> Option<(f64, f64)> {
    if closes.len() < period || period < 2 {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let mid = mean(window);
    let std_dev = window.iter().std_dev();
    Some((mid + width * std_dev, mid - width * std_dev))
}

/// Volume-weighted average price over a window of (typical price, volume)
/// pairs. `None` if total volume is zero.
pub fn vwap(prices: &[f64], volumes: &[f64]) -> Option<f64> {
    debug_assert_eq!(prices.len(), volumes.len());
    let total_volume: f64 = volumes.iter().sum();
    if total_volume <= 0.0 {
        return None;
    }
    let weighted: f64 = prices.iter().zip(volumes).map(|(p, v)| p * v).sum();
    Some(weighted / total_volume)
}
