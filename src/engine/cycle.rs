//! The cycle scheduler: cooperative batch processing on a fixed interval.
//!
//! Each cycle: drain the persistence retry queue, then run the cycle
//! body (buffer refresh, detection + confluence on a blocking task, one
//! atomic batch write) under a deadline equal to the interval. A
//! timed-out cycle is discarded whole; a failed write goes on a bounded
//! retry queue. Neither ever blocks the next cycle's detection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::data::{CandleSource, PointStore};
use crate::models::Point;

use super::core::MultiTimeframeTracker;

struct PendingBatch {
    points: Vec<Point>,
    attempts: usize,
}

pub struct CycleRunner {
    tracker: MultiTimeframeTracker,
    source: Arc<dyn CandleSource>,
    store: Arc<dyn PointStore>,
    pending: VecDeque<PendingBatch>,
    shutdown: watch::Receiver<bool>,
}

impl CycleRunner {
    /// Returns the runner plus the handle used to request shutdown.
    pub fn new(
        tracker: MultiTimeframeTracker,
        source: Arc<dyn CandleSource>,
        store: Arc<dyn PointStore>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = CycleRunner {
            tracker,
            source,
            store,
            pending: VecDeque::new(),
            shutdown: shutdown_rx,
        };
        (runner, shutdown_tx)
    }

    /// Drive cycles until shutdown is requested. In-flight work is simply
    /// abandoned on shutdown; nothing partial is ever persisted.
    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.tracker.context().cycle.interval_secs);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_one_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("cycle runner shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One full cycle. Public so embedders can drive the cadence
    /// themselves instead of using `run`.
    ///
    /// Everything after the retry drain (ingest, analysis, batch write)
    /// shares one deadline equal to the interval; overrunning it discards
    /// the whole cycle, so nothing partial is ever persisted or queued.
    pub async fn run_one_cycle(&mut self) {
        self.flush_pending().await;

        let deadline = Duration::from_secs(self.tracker.context().cycle.interval_secs);
        if tokio::time::timeout(deadline, self.cycle_body()).await.is_err() {
            log::warn!(
                "cycle exceeded its {}s deadline; discarding results",
                deadline.as_secs()
            );
        }
    }

    async fn cycle_body(&mut self) {
        self.tracker.ingest(self.source.as_ref()).await;

        // Detection is CPU-bound; run it off the async runtime
        let snapshot = self.tracker.clone();
        let result = match tokio::task::spawn_blocking(move || snapshot.run_cycle()).await {
            Ok(result) => result,
            Err(join_err) => {
                log::error!("analysis task failed: {join_err}");
                return;
            }
        };

        let points = result.into_points();
        if points.is_empty() {
            return;
        }

        if let Err(e) = self.store.save_points(&points).await {
            log::error!(
                "persistence failed for {} points, queued for retry: {e}",
                points.len()
            );
            self.pending.push_back(PendingBatch { points, attempts: 1 });
        }
    }

    /// Retry previously failed batches, dropping any that exhaust the
    /// configured attempt budget.
    async fn flush_pending(&mut self) {
        let max_attempts = self.tracker.context().cycle.max_persist_attempts;
        let mut still_pending = VecDeque::new();

        while let Some(mut batch) = self.pending.pop_front() {
            match self.store.save_points(&batch.points).await {
                Ok(()) => {
                    log::info!("retried batch of {} points persisted", batch.points.len());
                }
                Err(e) => {
                    batch.attempts += 1;
                    if batch.attempts >= max_attempts {
                        log::error!(
                            "dropping batch of {} points after {} attempts: {e}",
                            batch.points.len(),
                            batch.attempts
                        );
                    } else {
                        still_pending.push_back(batch);
                    }
                }
            }
        }
        self.pending = still_pending;
    }

    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::config::{AnalysisConfig, CycleSettings};
    use crate::data::{MemoryPointStore, PointFilter, StoreError};
    use crate::domain::{Candle, Timeframe};

    /// Serves a fixed candle series per timeframe.
    struct FixtureSource {
        series: Mutex<std::collections::BTreeMap<Timeframe, Vec<Candle>>>,
    }

    #[async_trait]
    impl CandleSource for FixtureSource {
        async fn get_latest(&self, timeframe: Timeframe, max_records: usize) -> Result<Vec<Candle>> {
            let guard = self.series.lock().unwrap();
            let series = guard.get(&timeframe).cloned().unwrap_or_default();
            let start = series.len().saturating_sub(max_records);
            Ok(series[start..].to_vec())
        }
    }

    /// Fails the first `fail_count` saves, then delegates to memory.
    struct FlakyStore {
        inner: MemoryPointStore,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl PointStore for FlakyStore {
        async fn save_points(&self, points: &[Point]) -> Result<(), StoreError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Timeout);
            }
            self.inner.save_points(points).await
        }

        async fn query_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
            self.inner.query_points(filter).await
        }
    }

    /// Stalls the first save long enough to blow any short deadline,
    /// then behaves like the memory store.
    struct StallOnceStore {
        inner: MemoryPointStore,
        stall: AtomicBool,
    }

    #[async_trait]
    impl PointStore for StallOnceStore {
        async fn save_points(&self, points: &[Point]) -> Result<(), StoreError> {
            if self.stall.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.save_points(points).await
        }

        async fn query_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
            self.inner.query_points(filter).await
        }
    }

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

    fn fixture_source() -> Arc<FixtureSource> {
        let peak_at = 15_000_000;
        let mut series = std::collections::BTreeMap::new();
        series.insert(
            Timeframe::M1,
            peak_series(peak_at - 50 * 60_000, 60_000, 101, 95.0),
        );
        series.insert(
            Timeframe::M5,
            peak_series(peak_at - 50 * 300_000, 300_000, 101, 95.5),
        );
        Arc::new(FixtureSource {
            series: Mutex::new(series),
        })
    }

    fn tracker() -> MultiTimeframeTracker {
        let ctx = Arc::new(AnalysisConfig {
            timeframes: vec![Timeframe::M1, Timeframe::M5],
            ..Default::default()
        });
        MultiTimeframeTracker::new(ctx)
    }

    #[tokio::test]
    async fn cycle_persists_detection_and_confluence_as_one_batch() {
        let store = Arc::new(MemoryPointStore::new());
        let (mut runner, _shutdown) = CycleRunner::new(tracker(), fixture_source(), store.clone());

        runner.run_one_cycle().await;

        let saved = store.query_points(&PointFilter::default()).await.unwrap();
        // One high per timeframe plus their confluence point
        assert_eq!(saved.len(), 3);
        assert!(saved.iter().any(|p| matches!(p, Point::Confluence(_))));
        assert_eq!(runner.pending_batches(), 0);
    }

    #[tokio::test]
    async fn failed_batch_is_retried_on_a_later_cycle() {
        let store = Arc::new(FlakyStore {
            inner: MemoryPointStore::new(),
            failures_left: AtomicUsize::new(1),
        });
        let (mut runner, _shutdown) = CycleRunner::new(tracker(), fixture_source(), store.clone());

        runner.run_one_cycle().await;
        assert_eq!(runner.pending_batches(), 1);
        assert!(store.inner.is_empty());

        // The next cycle drains the retry queue before running its own
        // detection pass, which re-emits the same still-buffered peak.
        runner.run_one_cycle().await;
        assert_eq!(runner.pending_batches(), 0);
        let saved = store
            .inner
            .query_points(&PointFilter::default())
            .await
            .unwrap();
        assert_eq!(saved.len(), 6); // retried batch + the new cycle's batch
    }

    #[tokio::test]
    async fn retry_queue_stays_bounded_under_persistent_failure() {
        let store = Arc::new(FlakyStore {
            inner: MemoryPointStore::new(),
            failures_left: AtomicUsize::new(usize::MAX),
        });
        let (mut runner, _shutdown) = CycleRunner::new(tracker(), fixture_source(), store.clone());

        for _ in 0..6 {
            runner.run_one_cycle().await;
        }
        // With a 3-attempt budget each batch survives at most two flushes,
        // so the queue never grows past two batches even when the store
        // stays down, and nothing ever lands in it.
        assert!(runner.pending_batches() <= 2);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn deadline_overrun_discards_the_cycle_whole() {
        let store = Arc::new(StallOnceStore {
            inner: MemoryPointStore::new(),
            stall: AtomicBool::new(true),
        });
        let ctx = Arc::new(AnalysisConfig {
            timeframes: vec![Timeframe::M1, Timeframe::M5],
            cycle: CycleSettings {
                interval_secs: 1,
                max_persist_attempts: 3,
            },
            ..Default::default()
        });
        let tracker = MultiTimeframeTracker::new(ctx);
        let (mut runner, _shutdown) = CycleRunner::new(tracker, fixture_source(), store.clone());

        // The stalled write pushes the cycle past its deadline: nothing
        // persisted, nothing queued for retry.
        runner.run_one_cycle().await;
        assert!(store.inner.is_empty());
        assert_eq!(runner.pending_batches(), 0);

        // The scheduler is unaffected; the next cycle lands its batch.
        runner.run_one_cycle().await;
        let saved = store
            .inner
            .query_points(&PointFilter::default())
            .await
            .unwrap();
        assert_eq!(saved.len(), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_the_run_loop() {
        let store = Arc::new(MemoryPointStore::new());
        let (runner, shutdown) = CycleRunner::new(tracker(), fixture_source(), store);

        let handle = tokio::spawn(runner.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("runner should stop promptly")
            .unwrap();
    }
}
