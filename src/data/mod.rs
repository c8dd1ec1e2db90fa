pub mod candle_buffer;
pub mod feed;
pub mod store;

pub use candle_buffer::CandleBuffer;
pub use feed::CandleSource;
pub use store::{MemoryPointStore, PointFilter, PointStore, StoreError};
