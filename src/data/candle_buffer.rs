use std::collections::VecDeque;

use crate::domain::{Candle, Timeframe};

/// Fixed-capacity ring buffer of candles for one timeframe.
///
/// Oldest candles are evicted once capacity is reached, so memory stays
/// bounded no matter how long the feed runs. Push enforces the candle
/// invariants and strict timestamp monotonicity; offenders are dropped
/// with a warning and the buffer carries on.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    timeframe: Timeframe,
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleBuffer {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        CandleBuffer {
            timeframe,
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.candles.back().map(|c| c.timestamp_ms)
    }

    /// Append one candle. Returns false (and logs) if the candle is
    /// malformed or not strictly newer than the current tail.
    pub fn push(&mut self, candle: Candle) -> bool {
        if !candle.is_well_formed() {
            log::warn!(
                "[{}] dropping malformed candle at ts {}: O={} H={} L={} C={}",
                self.timeframe,
                candle.timestamp_ms,
                candle.open,
                candle.high,
                candle.low,
                candle.close
            );
            return false;
        }

        if let Some(last_ts) = self.last_timestamp_ms() {
            if candle.timestamp_ms <= last_ts {
                log::warn!(
                    "[{}] dropping out-of-order candle: ts {} <= tail {}",
                    self.timeframe,
                    candle.timestamp_ms,
                    last_ts
                );
                return false;
            }
        }

        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        true
    }

    /// Append a batch, skipping candles already buffered (at or before the
    /// current tail). Returns how many were accepted.
    pub fn extend_latest(&mut self, batch: &[Candle]) -> usize {
        let mut accepted = 0;
        for candle in batch {
            let is_new = self
                .last_timestamp_ms()
                .is_none_or(|last| candle.timestamp_ms > last);
            if is_new && self.push(*candle) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Read-only copy for a detector to work on. Detectors never see the
    /// live buffer, so ingestion can proceed while analysis runs.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, price: f64) -> Candle {
        Candle::new(ts, price, price + 0.5, price - 0.5, price, 10.0)
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut buf = CandleBuffer::new(Timeframe::M1, 3);
        for i in 0..5 {
            assert!(buf.push(candle(i * 60_000, 100.0)));
        }
        assert_eq!(buf.len(), 3);
        let snap = buf.snapshot();
        assert_eq!(snap.first().unwrap().timestamp_ms, 2 * 60_000);
        assert_eq!(snap.last().unwrap().timestamp_ms, 4 * 60_000);
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut buf = CandleBuffer::new(Timeframe::M5, 10);
        assert!(buf.push(candle(1_000, 100.0)));
        assert!(!buf.push(candle(1_000, 101.0)));
        assert!(!buf.push(candle(500, 99.0)));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn rejects_malformed_candles() {
        let mut buf = CandleBuffer::new(Timeframe::M5, 10);
        let bad = Candle::new(0, 10.0, 9.0, 9.5, 10.5, 1.0);
        assert!(!buf.push(bad));
        assert!(buf.is_empty());
    }

    #[test]
    fn extend_skips_already_buffered() {
        let mut buf = CandleBuffer::new(Timeframe::M1, 10);
        let batch: Vec<Candle> = (0..4).map(|i| candle(i * 60_000, 100.0)).collect();
        assert_eq!(buf.extend_latest(&batch), 4);
        // Overlapping refetch: only the new tail should land
        let refetch: Vec<Candle> = (2..6).map(|i| candle(i * 60_000, 100.0)).collect();
        assert_eq!(buf.extend_latest(&refetch), 2);
        assert_eq!(buf.len(), 6);
    }
}
