//! Configuration for the tracker engine.

pub mod analysis;

pub use analysis::{
    AnalysisConfig, ClusterSettings, ConfluenceSettings, CycleSettings, DetectionSettings,
    ScoringSettings,
};
