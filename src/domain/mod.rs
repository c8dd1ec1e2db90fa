pub mod candle;
pub mod timeframe;

pub use candle::Candle;
pub use timeframe::Timeframe;
