pub mod detections;
pub mod validation;

pub use detections::{BoundingBox, Detection};
pub use validation::ValidationError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
