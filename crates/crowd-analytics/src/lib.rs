//! Crowd analytics core: snapshot history, heatmaps, zone clustering and
//! predictive alerting for a single monitored venue.

pub mod alerts;
pub mod analytics;
pub mod error;
pub mod feed;
pub mod heatmap;
pub mod hotspots;
pub mod monitor;
pub mod snapshot;
pub mod zones;

// Re-export commonly used types
pub use alerts::{
    analyze_and_generate_alerts, Alert, AlertSeverity, AlertThresholds, AlertType, AlertZone,
    ThresholdOverrides,
};
pub use analytics::{
    AnalyticsEntry, AnalyticsLog, AnalyticsReport, AnalyticsSummary, HourlyBucket, WeeklyBucket,
};
pub use error::AnalyticsError;
pub use feed::AlertFeed;
pub use heatmap::generate_heatmap;
pub use monitor::{CrowdMonitor, FrameAnalysis, FrameInput, MonitorSettings, SettingsUpdate};
pub use snapshot::{Hotspot, Snapshot, SnapshotHistory, MAX_HISTORY_LENGTH};
pub use zones::{auto_detect_zones, auto_detect_zones_default, Zone, ZoneDensity};
