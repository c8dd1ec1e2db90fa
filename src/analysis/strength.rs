//! Composite 0-100 confidence scoring for candidate extrema.
//!
//! Four sub-scores, each capped at 25: volume strength, proximity to the
//! nearest support/resistance level, time spent at the level, and
//! momentum-structure confirmation (RSI extreme, MACD histogram flip,
//! Bollinger band breach). The sum is capped at 100 and compared against
//! `CONFIRMATION_THRESHOLD` exactly once.

use crate::config::ScoringSettings;
use crate::domain::{Candle, Timeframe};
use crate::models::{CONFIRMATION_THRESHOLD, HighLowPoint, MarketStructure, PointType};
use crate::utils::maths_utils::{mean, within_pct};

use super::detector::RawCandidate;
use super::indicators::{bollinger_bands, macd_histogram_series, rsi};
use super::support_resistance::nearest_level;

const SUB_SCORE_CAP: f64 = 25.0;
const VOLUME_SPIKE_BONUS: f64 = 5.0;
const STRUCTURE_TREND_BARS: usize = 10;

pub struct StrengthScorer<'a> {
    settings: &'a ScoringSettings,
}

impl<'a> StrengthScorer<'a> {
    pub fn new(settings: &'a ScoringSettings) -> Self {
        StrengthScorer { settings }
    }

    /// Score one candidate and assemble the immutable point record.
    pub fn build_point(
        &self,
        candles: &[Candle],
        candidate: &RawCandidate,
        levels: &[f64],
        timeframe: Timeframe,
    ) -> HighLowPoint {
        let i = candidate.index;
        let closes: Vec<f64> = candles[..=i].iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles[..=i].iter().map(|c| c.volume).collect();

        let volume_score = self.volume_strength(&volumes, candidate.volume_spike);
        let (level, proximity_score) = self.level_proximity(levels, candidate.price);
        let persistence_score = self.time_at_level(&closes, candidate.price);
        let structure_score = self.structure_confirmation(candles, &closes, candidate);

        let strength =
            (volume_score + proximity_score + persistence_score + structure_score).min(100.0);

        HighLowPoint {
            timestamp_ms: candidate.timestamp_ms,
            price: candidate.price,
            volume: candidate.volume,
            timeframe,
            point_type: candidate.point_type,
            strength,
            confirmation: strength > CONFIRMATION_THRESHOLD,
            support_resistance_level: level,
            fibonacci_level: None,
            elliott_wave_position: None,
            market_structure: Some(self.market_structure(&closes)),
        }
    }

    /// 0-25: current volume relative to its recent mean, plus a small
    /// bonus when the detector's volume-deviation signal fired.
    fn volume_strength(&self, volumes: &[f64], volume_spike: bool) -> f64 {
        let Some((&current, history)) = volumes.split_last() else {
            return 0.0;
        };
        let start = history.len().saturating_sub(self.settings.lookback_bars);
        let avg = mean(&history[start..]);
        if avg <= 0.0 {
            return 0.0;
        }
        let mut score = (10.0 * current / avg).min(SUB_SCORE_CAP);
        if volume_spike {
            score = (score + VOLUME_SPIKE_BONUS).min(SUB_SCORE_CAP);
        }
        score
    }

    /// 0-25: closeness to the nearest clustered level. Returns the level
    /// alongside the score; with no levels the candidate price stands in
    /// and the sub-score is zero.
    fn level_proximity(&self, levels: &[f64], price: f64) -> (f64, f64) {
        match nearest_level(levels, price) {
            Some(level) if price > 0.0 => {
                let score = SUB_SCORE_CAP * (1.0 - ((price - level).abs() / price));
                (level, score.clamp(0.0, SUB_SCORE_CAP))
            }
            _ => (price, 0.0),
        }
    }

    /// 0-25: how many recent closes sat within tolerance of the price.
    fn time_at_level(&self, closes: &[f64], price: f64) -> f64 {
        let start = closes.len().saturating_sub(self.settings.lookback_bars);
        let touches = closes[start..]
            .iter()
            .filter(|close| within_pct(**close, price, self.settings.level_tolerance_pct))
            .count();
        (5.0 * touches as f64).min(SUB_SCORE_CAP)
    }

    /// 0-25: +10 RSI at a matching extreme, +10 MACD histogram flipping
    /// in the point's direction between i-1 and i, +5 Bollinger breach.
    fn structure_confirmation(
        &self,
        candles: &[Candle],
        closes: &[f64],
        candidate: &RawCandidate,
    ) -> f64 {
        let mut score: f64 = 0.0;

        if let Some(rsi_value) = rsi(closes, self.settings.rsi_period) {
            let extreme = match candidate.point_type {
                PointType::High => rsi_value > self.settings.rsi_overbought,
                PointType::Low => rsi_value < self.settings.rsi_oversold,
            };
            if extreme {
                score += 10.0;
            }
        }

        if let Some(hist) = macd_histogram_series(closes) {
            if hist.len() >= 2 {
                let curr = hist[hist.len() - 1];
                let prev = hist[hist.len() - 2];
                let flipped = match candidate.point_type {
                    PointType::High => curr < prev,
                    PointType::Low => curr > prev,
                };
                if flipped {
                    score += 10.0;
                }
            }
        }

        if let Some((upper, lower)) = bollinger_bands(
            closes,
            self.settings.bollinger_period,
            self.settings.bollinger_width,
        ) {
            let bar = &candles[candidate.index];
            let breached = match candidate.point_type {
                PointType::High => bar.high > upper,
                PointType::Low => bar.low < lower,
            };
            if breached {
                score += 5.0;
            }
        }

        score.min(SUB_SCORE_CAP)
    }

    /// Coarse trend read over the closes leading into the point.
    fn market_structure(&self, closes: &[f64]) -> MarketStructure {
        let start = closes.len().saturating_sub(STRUCTURE_TREND_BARS);
        let recent = &closes[start..];
        if recent.len() < 3 {
            return MarketStructure::Ranging;
        }
        if recent.windows(2).all(|w| w[1] >= w[0]) {
            MarketStructure::Uptrend
        } else if recent.windows(2).all(|w| w[1] <= w[0]) {
            MarketStructure::Downtrend
        } else {
            MarketStructure::Ranging
        }
    }
}
