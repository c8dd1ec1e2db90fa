pub mod confluence;
pub mod detector;
pub mod indicators;
pub mod strength;
pub mod support_resistance;

pub use confluence::aggregate_confluence;
pub use detector::{RawCandidate, TimeframeDetector};
pub use strength::StrengthScorer;
pub use support_resistance::cluster_levels;
