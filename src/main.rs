use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

use swing_scout::utils::time_utils::epoch_ms_to_utc;
use swing_scout::{
    AnalysisConfig, Candle, CandleSource, CycleRunner, MemoryPointStore, MultiTimeframeTracker,
    Point, PointFilter, PointStore, Timeframe,
};

/// Seeded random-walk feed so the demo produces the same tape every run.
/// Each call extends the walk by however many bars have "elapsed" since
/// the last one, which is enough to drive the engine end to end without
/// an exchange connection.
struct RandomWalkSource {
    state: Mutex<WalkState>,
}

struct WalkState {
    rng: StdRng,
    price: f64,
    series: std::collections::BTreeMap<Timeframe, Vec<Candle>>,
}

impl RandomWalkSource {
    fn new(seed: u64, start_price: f64) -> Self {
        RandomWalkSource {
            state: Mutex::new(WalkState {
                rng: StdRng::seed_from_u64(seed),
                price: start_price,
                series: std::collections::BTreeMap::new(),
            }),
        }
    }
}

#[async_trait]
impl CandleSource for RandomWalkSource {
    async fn get_latest(&self, timeframe: Timeframe, max_records: usize) -> Result<Vec<Candle>> {
        let mut state = self.state.lock().expect("walk state lock");

        let interval = timeframe.interval_ms();
        let series = state.series.entry(timeframe).or_default();
        let next_ts = series.last().map_or(0, |c| c.timestamp_ms + interval);
        let mut price = state.price;
        let mut bars = Vec::with_capacity(max_records);
        for i in 0..max_records as i64 {
            let drift: f64 = state.rng.gen_range(-0.5..0.5);
            let open = price;
            let close = (price + drift).max(1.0);
            let high = open.max(close) + state.rng.gen_range(0.0..0.2);
            let low = (open.min(close) - state.rng.gen_range(0.0..0.2)).max(0.5);
            let volume = state.rng.gen_range(50.0..150.0);
            bars.push(Candle::new(
                next_ts + i * interval,
                open,
                high,
                low,
                close,
                volume,
            ));
            price = close;
        }
        state.price = price;

        let series = state.series.get_mut(&timeframe).expect("series exists");
        series.extend_from_slice(&bars);
        let start = series.len().saturating_sub(max_records);
        Ok(series[start..].to_vec())
    }
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {:?}", panic_info);
    }));
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = Arc::new(AnalysisConfig {
        cycle: swing_scout::config::CycleSettings {
            interval_secs: 2,
            max_persist_attempts: 3,
        },
        ..Default::default()
    });

    let source = Arc::new(RandomWalkSource::new(7, 100.0));
    let store = Arc::new(MemoryPointStore::new());
    let tracker = MultiTimeframeTracker::new(config);

    let rt = Runtime::new().expect("Failed to create Tokio runtime");
    rt.block_on(async {
        let (runner, shutdown) = CycleRunner::new(tracker, source, store.clone());
        let handle = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_secs(7)).await;
        let _ = shutdown.send(true);
        let _ = handle.await;

        let points = store.query_points(&PointFilter::default()).await?;
        log::info!("demo run finished with {} stored points", points.len());
        for point in &points {
            match point {
                Point::HighLow(p) => log::info!(
                    "[{}] {} @ {:.2} ({}) strength {:.1}",
                    p.timeframe,
                    p.point_type,
                    p.price,
                    epoch_ms_to_utc(p.timestamp_ms),
                    p.strength
                ),
                Point::Confluence(p) => log::info!(
                    "[confluence x{}] {} @ {:.2} ({}) strength {:.1}",
                    p.member_count,
                    p.point_type,
                    p.price,
                    epoch_ms_to_utc(p.timestamp_ms),
                    p.strength
                ),
            }
        }
        Ok(())
    })
}
