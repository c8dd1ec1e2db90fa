use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Timeframe;
use crate::models::{Point, PointType};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store rejected batch: {0}")]
    Rejected(String),
    #[error("store write timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// AND-combined query filters. All fields optional; `Default` matches
/// everything.
#[derive(Debug, Clone, Default)]
pub struct PointFilter {
    pub timeframe: Option<Timeframe>,
    pub point_type: Option<PointType>,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
}

impl PointFilter {
    pub fn matches(&self, point: &Point) -> bool {
        if let Some(tf) = self.timeframe {
            if point.timeframe() != tf {
                return false;
            }
        }
        if let Some(pt) = self.point_type {
            if point.point_type() != pt {
                return false;
            }
        }
        if let Some(start) = self.start_time_ms {
            if point.timestamp_ms() < start {
                return false;
            }
        }
        if let Some(end) = self.end_time_ms {
            if point.timestamp_ms() > end {
                return false;
            }
        }
        true
    }
}

/// Durable append-only log of detected points.
///
/// `save_points` must be called with the full batch for a cycle; the
/// engine never splits a cycle across writes.
#[async_trait]
pub trait PointStore: Send + Sync {
    async fn save_points(&self, points: &[Point]) -> Result<(), StoreError>;

    /// Query results are ordered by timestamp descending.
    async fn query_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError>;
}

/// In-memory reference store. Backs the tests and lets embedders run the
/// engine without wiring a database.
#[derive(Default)]
pub struct MemoryPointStore {
    points: Mutex<Vec<Point>>,
}

impl MemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn save_points(&self, points: &[Point]) -> Result<(), StoreError> {
        let mut guard = self
            .points
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        guard.extend_from_slice(points);
        Ok(())
    }

    async fn query_points(&self, filter: &PointFilter) -> Result<Vec<Point>, StoreError> {
        let guard = self
            .points
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut results: Vec<Point> = guard.iter().filter(|p| filter.matches(p)).cloned().collect();
        results.sort_by_key(|p| std::cmp::Reverse(p.timestamp_ms()));
        Ok(results)
    }
}
