//! Crowd monitoring workspace: detection contracts, telemetry, the crowd
//! analytics core and its HTTP service.

pub use common;
pub use crowd_analytics;
pub use crowd_service;
pub use telemetry;
