//! Small shared data structures used by both the frontend and the two
//! lowering stages.

pub mod bitmap;
pub mod chained_map;

pub use bitmap::Bitmap;
pub use chained_map::ChainedMap;
