use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use rayon::prelude::*;

use crate::analysis::{TimeframeDetector, aggregate_confluence};
use crate::analysis::support_resistance::cluster_levels;
use crate::config::AnalysisConfig;
use crate::data::{CandleBuffer, CandleSource};
use crate::domain::{Candle, Timeframe};
use crate::models::{ConfluencePoint, HighLowPoint, Point};

/// Owns one candle buffer (and, per cycle, one detector pass) per
/// configured timeframe. Analyses are independent and run in parallel on
/// read-only snapshots; collecting the results is the barrier before
/// confluence aggregation starts.
#[derive(Clone)]
pub struct MultiTimeframeTracker {
    ctx: Arc<AnalysisConfig>,
    buffers: BTreeMap<Timeframe, CandleBuffer>,
}

impl MultiTimeframeTracker {
    pub fn new(ctx: Arc<AnalysisConfig>) -> Self {
        let buffers = ctx
            .timeframes
            .iter()
            .map(|tf| (*tf, CandleBuffer::new(*tf, ctx.max_records)))
            .collect();
        MultiTimeframeTracker { ctx, buffers }
    }

    pub fn context(&self) -> &AnalysisConfig {
        &self.ctx
    }

    pub fn buffer(&self, timeframe: Timeframe) -> Option<&CandleBuffer> {
        self.buffers.get(&timeframe)
    }

    /// Pull the latest candles for every timeframe into the ring buffers.
    /// Fetches run concurrently; a feed error for one timeframe is logged
    /// and isolated, the others still refresh.
    pub async fn ingest(&mut self, source: &dyn CandleSource) {
        let max_records = self.ctx.max_records;
        let fetches = self.buffers.keys().map(|tf| {
            let tf = *tf;
            async move { (tf, source.get_latest(tf, max_records).await) }
        });
        let batches = join_all(fetches).await;

        for (tf, fetched) in batches {
            match fetched {
                Ok(batch) => {
                    let buffer = self.buffers.get_mut(&tf).expect("buffer exists per key");
                    let accepted = buffer.extend_latest(&batch);
                    log::debug!(
                        "[{}] ingested {} of {} candles (buffer {})",
                        tf,
                        accepted,
                        batch.len(),
                        buffer.len()
                    );
                }
                Err(e) => {
                    log::warn!("[{}] feed error, timeframe skipped this refresh: {:#}", tf, e);
                }
            }
        }
    }

    /// Cluster every buffered high and low into the cycle's shared
    /// support/resistance level list.
    pub fn support_resistance_levels(&self) -> Vec<f64> {
        let mut prices = Vec::new();
        for buffer in self.buffers.values() {
            for candle in buffer.iter() {
                prices.push(candle.high);
                prices.push(candle.low);
            }
        }
        cluster_levels(&prices, &self.ctx.cluster)
    }

    /// One detection pass over every eligible timeframe.
    ///
    /// Timeframes with fewer than `min_candles_for_analysis` buffered
    /// candles are simply absent from the result map.
    pub fn analyze_all(&self) -> BTreeMap<Timeframe, Vec<HighLowPoint>> {
        let levels = self.support_resistance_levels();

        let eligible: Vec<(Timeframe, Vec<Candle>)> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.len() >= self.ctx.min_candles_for_analysis)
            .map(|(tf, buffer)| (*tf, buffer.snapshot()))
            .collect();

        // Fan out per timeframe; collect() completes only when every
        // eligible timeframe has finished (the aggregation barrier).
        let results: Vec<(Timeframe, Vec<HighLowPoint>)> = eligible
            .par_iter()
            .map(|(tf, candles)| {
                let detector = TimeframeDetector::new(*tf, self.ctx.detection.clone());
                let points = detector.analyze(candles, &levels, &self.ctx.scoring);
                (*tf, points)
            })
            .collect();

        results.into_iter().collect()
    }

    /// Detection plus confluence for one cycle. Pure with respect to the
    /// buffers; persistence is the caller's concern.
    pub fn run_cycle(&self) -> CycleResult {
        let per_timeframe = self.analyze_all();
        let all_points: Vec<HighLowPoint> =
            per_timeframe.values().flatten().cloned().collect();
        let confluence = aggregate_confluence(&all_points, &self.ctx.confluence);

        log::info!(
            "cycle: {} raw points across {} timeframes, {} confluence points",
            all_points.len(),
            per_timeframe.len(),
            confluence.len()
        );

        CycleResult {
            per_timeframe,
            confluence,
        }
    }
}

/// Everything one analysis cycle produced.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub per_timeframe: BTreeMap<Timeframe, Vec<HighLowPoint>>,
    pub confluence: Vec<ConfluencePoint>,
}

impl CycleResult {
    pub fn point_count(&self) -> usize {
        self.per_timeframe.values().map(Vec::len).sum::<usize>() + self.confluence.len()
    }

    /// Flatten into the store batch for this cycle.
    pub fn into_points(self) -> Vec<Point> {
        let mut points: Vec<Point> = self
            .per_timeframe
            .into_values()
            .flatten()
            .map(Point::HighLow)
            .collect();
        points.extend(self.confluence.into_iter().map(Point::Confluence));
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    use crate::models::PointType;

    /// Doji bars rising to a peak at the middle bar, then falling.
    /// `t0_ms` positions the peak in absolute time.
    fn peak_series(t0_ms: i64, interval_ms: i64, bars: usize, base: f64) -> Vec<Candle> {
        let mid = bars / 2;
        (0..bars)
            .map(|i| {
                let steps = if i <= mid { i } else { bars - 1 - i };
                let price = base + 0.1 * steps as f64;
                Candle::new(
                    t0_ms + i as i64 * interval_ms,
                    price,
                    price + 0.02,
                    price - 0.02,
                    price,
                    100.0,
                )
            })
            .collect()
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            timeframes: vec![Timeframe::M1, Timeframe::M5, Timeframe::H1],
            ..Default::default()
        }
    }

    fn loaded_tracker() -> MultiTimeframeTracker {
        let ctx = Arc::new(test_config());
        let mut tracker = MultiTimeframeTracker::new(ctx);

        // Both peaks land at the same absolute time so the cycle's
        // confluence pass has something to merge.
        let peak_at = 15_000 * 1_000;
        let m1 = peak_series(peak_at - 50 * 60_000, 60_000, 101, 95.0);
        let m5 = peak_series(peak_at - 50 * 300_000, 300_000, 101, 95.5);
        for c in &m1 {
            tracker.buffers.get_mut(&Timeframe::M1).unwrap().push(*c);
        }
        for c in &m5 {
            tracker.buffers.get_mut(&Timeframe::M5).unwrap().push(*c);
        }
        // H1 stays far below the minimum candle count
        for c in peak_series(0, 3_600_000, 10, 90.0) {
            tracker.buffers.get_mut(&Timeframe::H1).unwrap().push(c);
        }
        tracker
    }

    /// Serves M1 normally and fails every other timeframe.
    struct HalfDownSource;

    #[async_trait]
    impl CandleSource for HalfDownSource {
        async fn get_latest(
            &self,
            timeframe: Timeframe,
            _max_records: usize,
        ) -> anyhow::Result<Vec<Candle>> {
            match timeframe {
                Timeframe::M1 => Ok(peak_series(0, 60_000, 60, 95.0)),
                _ => bail!("feed offline"),
            }
        }
    }

    #[tokio::test]
    async fn ingest_fills_buffers_and_isolates_feed_errors() {
        let ctx = Arc::new(AnalysisConfig {
            timeframes: vec![Timeframe::M1, Timeframe::M5],
            ..Default::default()
        });
        let mut tracker = MultiTimeframeTracker::new(ctx);
        tracker.ingest(&HalfDownSource).await;

        assert_eq!(tracker.buffer(Timeframe::M1).unwrap().len(), 60);
        assert!(tracker.buffer(Timeframe::M5).unwrap().is_empty());
    }

    #[test]
    fn analyze_all_skips_underfilled_timeframes() {
        let tracker = loaded_tracker();
        let results = tracker.analyze_all();
        assert!(results.contains_key(&Timeframe::M1));
        assert!(results.contains_key(&Timeframe::M5));
        assert!(!results.contains_key(&Timeframe::H1));
    }

    #[test]
    fn each_loaded_timeframe_detects_its_peak() {
        let tracker = loaded_tracker();
        let results = tracker.analyze_all();
        for tf in [Timeframe::M1, Timeframe::M5] {
            let points = &results[&tf];
            assert_eq!(points.len(), 1, "{tf}: {points:?}");
            assert_eq!(points[0].point_type, PointType::High);
            assert_eq!(points[0].timestamp_ms, 15_000_000);
            assert_eq!(points[0].confirmation, points[0].strength > 70.0);
        }
    }

    #[test]
    fn run_cycle_merges_aligned_peaks_into_confluence() {
        let tracker = loaded_tracker();
        let result = tracker.run_cycle();
        assert_eq!(result.confluence.len(), 1);
        let cp = &result.confluence[0];
        assert_eq!(cp.member_count, 2);
        assert_eq!(cp.timestamp_ms, 15_000_000);
        assert!(cp.confirmation);

        let points = result.into_points();
        assert_eq!(points.len(), 3); // 2 raw + 1 confluence
    }

    #[test]
    fn support_resistance_levels_are_sorted_and_deterministic() {
        let tracker = loaded_tracker();
        let a = tracker.support_resistance_levels();
        let b = tracker.support_resistance_levels();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(!a.is_empty());
    }
}
