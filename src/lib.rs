#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::type_complexity)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod models;
pub mod utils;

// The engine
pub mod engine;

// Re-export commonly used types
pub use config::AnalysisConfig;
pub use data::{CandleBuffer, CandleSource, MemoryPointStore, PointFilter, PointStore, StoreError};
pub use domain::{Candle, Timeframe};
pub use engine::{CycleRunner, MultiTimeframeTracker};
pub use models::{CONFIRMATION_THRESHOLD, ConfluencePoint, HighLowPoint, Point, PointType};
