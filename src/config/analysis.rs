//! Analysis and computation configuration.
//!
//! One `AnalysisConfig` is constructed at startup and shared immutably
//! (behind an `Arc`) with every component for the life of the engine.
//! There is deliberately no mutable global state.

use crate::domain::Timeframe;
use crate::utils::TimeUtils;

/// Settings for the per-timeframe extremum detector.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Half-width W of the centered detection window; only indices in
    /// [W, N-W) are eligible candidates.
    pub window_half_width: usize,
    // Tolerance (fractional) for the pivot-proximity gate
    pub pivot_tolerance_pct: f64,
    // Thresholds for the auxiliary volume-weighted deviation signal
    pub vwap_deviation_pct: f64,
    pub volume_spike_ratio: f64,
}

/// Settings for the composite strength score.
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    // Bars of history used for volume and time-at-level sub-scores
    pub lookback_bars: usize,
    // Tolerance (fractional) when counting bars "at" the candidate price
    pub level_tolerance_pct: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub bollinger_period: usize,
    pub bollinger_width: f64,
}

/// Settings for the support/resistance clustering step.
///
/// The cluster-count heuristic (`distinct_prices / divisor`, clamped) has
/// no principled derivation; it is exposed here for calibration runs.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    pub divisor: usize,
    pub min_clusters: usize,
    pub max_clusters: usize,
    // Seed for centroid initialization; same input + same seed = same levels
    pub seed: u64,
    pub max_iterations: usize,
}

/// Settings for cross-timeframe confluence grouping.
#[derive(Debug, Clone)]
pub struct ConfluenceSettings {
    pub max_time_gap_ms: i64,
    pub max_price_drift_pct: f64,
    /// When true, a group only becomes a confluence point if its members
    /// span at least two distinct timeframes.
    pub require_distinct_timeframes: bool,
    pub strength_boost: f64,
}

/// Settings for the cycle scheduler and persistence retry policy.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Cycle cadence; also the per-cycle deadline.
    pub interval_secs: u64,
    pub max_persist_attempts: usize,
}

/// The master analysis configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Timeframes tracked by the engine, one detector each.
    pub timeframes: Vec<Timeframe>,
    /// Ring buffer capacity per timeframe.
    pub max_records: usize,
    /// Timeframes with fewer buffered candles than this are skipped for
    /// the cycle (not an error).
    pub min_candles_for_analysis: usize,

    // Sub-groups
    pub detection: DetectionSettings,
    pub scoring: ScoringSettings,
    pub cluster: ClusterSettings,
    pub confluence: ConfluenceSettings,
    pub cycle: CycleSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            timeframes: vec![
                Timeframe::M1,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::H1,
            ],
            max_records: 500,
            min_candles_for_analysis: 50,

            detection: DetectionSettings {
                window_half_width: 5,
                pivot_tolerance_pct: 0.01,
                vwap_deviation_pct: 0.02,
                volume_spike_ratio: 1.5,
            },
            scoring: ScoringSettings {
                lookback_bars: 20,
                level_tolerance_pct: 0.01,
                rsi_period: 14,
                rsi_overbought: 70.0,
                rsi_oversold: 30.0,
                bollinger_period: 20,
                bollinger_width: 2.0,
            },
            cluster: ClusterSettings {
                divisor: 10,
                min_clusters: 2,
                max_clusters: 10,
                seed: 42,
                max_iterations: 50,
            },
            confluence: ConfluenceSettings {
                max_time_gap_ms: TimeUtils::MS_IN_30_MIN,
                max_price_drift_pct: 0.02,
                require_distinct_timeframes: false,
                strength_boost: 1.5,
            },
            cycle: CycleSettings {
                interval_secs: 60,
                max_persist_attempts: 3,
            },
        }
    }
}
