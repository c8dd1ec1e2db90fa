pub mod point;

pub use point::{
    CONFIRMATION_THRESHOLD, ConfluencePoint, HighLowPoint, MarketStructure, Point, PointType,
};
