use tracing_subscriber::{fmt, EnvFilter};

pub mod logging;
pub mod metrics;

// Re-export commonly used items
pub use logging::{init_structured_logging, init_with_service, LogConfig, LogFormat, LoggingGuard};

/// Minimal stdout logging for tools and tests
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
