pub mod core;
pub mod cycle;

pub use core::{CycleResult, MultiTimeframeTracker};
pub use cycle::CycleRunner;
