//! Per-timeframe extremum detection.
//!
//! A candidate must clear three independent gates at once: it is the
//! rolling extreme of its centered window, it is a Williams fractal, and
//! it sits within tolerance of a classical floor-trader pivot level
//! projected from the prior bar. A fourth signal (volume-weighted price
//! deviation) is computed per candidate but only feeds the strength
//! scorer; it never gates detection.

use crate::config::{DetectionSettings, ScoringSettings};
use crate::domain::{Candle, Timeframe};
use crate::models::{HighLowPoint, PointType};
use crate::utils::maths_utils::{get_max, get_min, mean, within_pct};

use super::indicators::vwap;
use super::strength::StrengthScorer;

/// An unscored candidate extremum. `index` points into the sanitized
/// candle window the detector ran over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
    pub index: usize,
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: f64,
    pub point_type: PointType,
    /// Auxiliary volume-weighted deviation signal, scorer input only.
    pub volume_spike: bool,
}

pub struct TimeframeDetector {
    timeframe: Timeframe,
    settings: DetectionSettings,
}

impl TimeframeDetector {
    pub fn new(timeframe: Timeframe, settings: DetectionSettings) -> Self {
        TimeframeDetector {
            timeframe,
            settings,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Full pass for one timeframe: sanitize, detect, score.
    pub fn analyze(
        &self,
        candles: &[Candle],
        levels: &[f64],
        scoring: &ScoringSettings,
    ) -> Vec<HighLowPoint> {
        let clean = self.sanitize(candles);
        let scorer = StrengthScorer::new(scoring);
        self.detect(&clean)
            .iter()
            .map(|candidate| scorer.build_point(&clean, candidate, levels, self.timeframe))
            .collect()
    }

    /// Drop candles that violate the OHLC invariants or break timestamp
    /// monotonicity. Detection proceeds on the remainder.
    pub fn sanitize(&self, candles: &[Candle]) -> Vec<Candle> {
        let mut clean: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            if !candle.is_well_formed() {
                log::warn!(
                    "[{}] skipping malformed candle at ts {}",
                    self.timeframe,
                    candle.timestamp_ms
                );
                continue;
            }
            if let Some(last) = clean.last() {
                if candle.timestamp_ms <= last.timestamp_ms {
                    log::warn!(
                        "[{}] skipping out-of-order candle: ts {} <= {}",
                        self.timeframe,
                        candle.timestamp_ms,
                        last.timestamp_ms
                    );
                    continue;
                }
            }
            clean.push(*candle);
        }
        clean
    }

    /// Run the detection gates over an already-sanitized window.
    ///
    /// Only indices in [W, N-W) are eligible; windows shorter than 2W+1
    /// bars yield no candidates (that is not an error).
    pub fn detect(&self, candles: &[Candle]) -> Vec<RawCandidate> {
        let w = self.settings.window_half_width;
        let n = candles.len();
        if w == 0 || n < 2 * w + 1 {
            return Vec::new();
        }

        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        let mut candidates = Vec::new();
        for i in w..(n - w) {
            if self.is_high_candidate(&highs, candles, i, w) {
                candidates.push(RawCandidate {
                    index: i,
                    timestamp_ms: candles[i].timestamp_ms,
                    price: highs[i],
                    volume: volumes[i],
                    point_type: PointType::High,
                    volume_spike: self.volume_deviation(candles, &volumes, i, w, highs[i]),
                });
            }
            if self.is_low_candidate(&lows, candles, i, w) {
                candidates.push(RawCandidate {
                    index: i,
                    timestamp_ms: candles[i].timestamp_ms,
                    price: lows[i],
                    volume: volumes[i],
                    point_type: PointType::Low,
                    volume_spike: self.volume_deviation(candles, &volumes, i, w, lows[i]),
                });
            }
        }
        candidates
    }

    fn is_high_candidate(&self, highs: &[f64], candles: &[Candle], i: usize, w: usize) -> bool {
        // Gate 1: rolling extreme of the centered window
        let window_max = get_max(&highs[i - w..=i + w]);
        if highs[i] < window_max {
            return false;
        }

        // Gate 2: Williams fractal, strict on both flanks
        let left_ok = highs[i - w..i].iter().all(|h| *h < highs[i]);
        let right_ok = highs[i + 1..=i + w].iter().all(|h| *h < highs[i]);
        if !left_ok || !right_ok {
            return false;
        }

        // Gate 3: proximity to the prior bar's pivot resistance levels
        let prev = &candles[i - 1];
        let pp = prev.typical_price();
        let r1 = 2.0 * pp - prev.low;
        let r2 = pp + (prev.high - prev.low);
        within_pct(highs[i], r1, self.settings.pivot_tolerance_pct)
            || within_pct(highs[i], r2, self.settings.pivot_tolerance_pct)
    }

    fn is_low_candidate(&self, lows: &[f64], candles: &[Candle], i: usize, w: usize) -> bool {
        let window_min = get_min(&lows[i - w..=i + w]);
        if lows[i] > window_min {
            return false;
        }

        let left_ok = lows[i - w..i].iter().all(|l| *l > lows[i]);
        let right_ok = lows[i + 1..=i + w].iter().all(|l| *l > lows[i]);
        if !left_ok || !right_ok {
            return false;
        }

        let prev = &candles[i - 1];
        let pp = prev.typical_price();
        let s1 = 2.0 * pp - prev.high;
        let s2 = pp - (prev.high - prev.low);
        within_pct(lows[i], s1, self.settings.pivot_tolerance_pct)
            || within_pct(lows[i], s2, self.settings.pivot_tolerance_pct)
    }

    /// Price deviating from the W-bar VWAP while volume runs above its
    /// W-bar rolling mean.
    fn volume_deviation(
        &self,
        candles: &[Candle],
        volumes: &[f64],
        i: usize,
        w: usize,
        price: f64,
    ) -> bool {
        let typicals: Vec<f64> = candles[i - w..i].iter().map(|c| c.typical_price()).collect();
        let window_volumes = &volumes[i - w..i];

        let Some(window_vwap) = vwap(&typicals, window_volumes) else {
            return false;
        };
        let deviated = !within_pct(price, window_vwap, self.settings.vwap_deviation_pct);

        let avg_volume = mean(window_volumes);
        let spiked = avg_volume > 0.0 && volumes[i] > self.settings.volume_spike_ratio * avg_volume;

        deviated && spiked
    }
}
