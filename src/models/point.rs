use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::domain::Timeframe;

/// A point whose strength exceeds this is a confirmed extremum.
/// Single source of truth for the `confirmation` flag.
pub const CONFIRMATION_THRESHOLD: f64 = 70.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum PointType {
    High,
    Low,
}

impl std::fmt::Display for PointType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PointType::High => write!(f, "high"),
            PointType::Low => write!(f, "low"),
        }
    }
}

/// Coarse trend classification over the bars leading into a point.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStructure {
    Uptrend,
    Downtrend,
    Ranging,
}

/// A detected extremum on a single timeframe, scored and immutable.
///
/// `fibonacci_level` and `elliott_wave_position` are carried for
/// downstream consumers; this engine leaves them unset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HighLowPoint {
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: f64,
    pub timeframe: Timeframe,
    pub point_type: PointType,
    /// Composite confidence in [0, 100].
    pub strength: f64,
    /// Always equals `strength > CONFIRMATION_THRESHOLD`.
    pub confirmation: bool,
    pub support_resistance_level: f64,
    pub fibonacci_level: Option<f64>,
    pub elliott_wave_position: Option<u8>,
    pub market_structure: Option<MarketStructure>,
}

/// A synthesized point backed by two or more HighLowPoints that agree in
/// time and price. Always confirmed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfluencePoint {
    pub timestamp_ms: i64,
    pub price: f64,
    pub volume: f64,
    /// Timeframe of the strongest contributing member.
    pub timeframe: Timeframe,
    pub point_type: PointType,
    pub strength: f64,
    pub confirmation: bool,
    pub support_resistance_level: f64,
    pub fibonacci_level: Option<f64>,
    pub elliott_wave_position: Option<u8>,
    pub market_structure: Option<MarketStructure>,
    // Provenance
    pub member_count: usize,
    pub contributing_timeframes: Vec<Timeframe>,
}

/// Everything the store persists. Exhaustive at the store boundary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Point {
    HighLow(HighLowPoint),
    Confluence(ConfluencePoint),
}

impl Point {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            Point::HighLow(p) => p.timestamp_ms,
            Point::Confluence(p) => p.timestamp_ms,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            Point::HighLow(p) => p.price,
            Point::Confluence(p) => p.price,
        }
    }

    pub fn point_type(&self) -> PointType {
        match self {
            Point::HighLow(p) => p.point_type,
            Point::Confluence(p) => p.point_type,
        }
    }

    pub fn strength(&self) -> f64 {
        match self {
            Point::HighLow(p) => p.strength,
            Point::Confluence(p) => p.strength,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        match self {
            Point::HighLow(p) => p.timeframe,
            Point::Confluence(p) => p.timeframe,
        }
    }
}
