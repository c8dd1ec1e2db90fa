use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Candle, Timeframe};

/// Upstream candle feed. Implemented by whatever supplies market data
/// (exchange client, replay file, test fixture); the engine only pulls.
///
/// Returned candles must be ordered by ascending timestamp. Gaps are
/// tolerated and passed through; the engine does not backfill.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn get_latest(&self, timeframe: Timeframe, max_records: usize) -> Result<Vec<Candle>>;
}
