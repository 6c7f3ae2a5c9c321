use crate::alerts::{analyze_and_generate_alerts, Alert, AlertSeverity, AlertThresholds, ThresholdOverrides};
use crate::analytics::{AnalyticsEntry, AnalyticsLog};
use crate::error::{ensure_positive, AnalyticsError};
use crate::feed::{AlertFeed, DEFAULT_DEDUP_WINDOW_SECS};
use crate::heatmap::{generate_heatmap, DEFAULT_GRID_SIZE};
use crate::snapshot::{Snapshot, SnapshotHistory};
use crate::zones::{auto_detect_zones, Zone, DEFAULT_MAX_ZONES};
use chrono::{DateTime, Duration, Utc};
use common::validation::{validate_detections, validate_image_size};
use common::Detection;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use telemetry::metrics::{CROWD_FRAMES_PROCESSED, CROWD_FRAME_PROCESSING_TIME, CROWD_PEOPLE_COUNT};
use uuid::Uuid;

fn default_estimated_capacity() -> f64 {
    100.0
}

fn default_max_zones() -> usize {
    DEFAULT_MAX_ZONES
}

fn default_heatmap_grid_size() -> u32 {
    DEFAULT_GRID_SIZE
}

fn default_dedup_window_secs() -> i64 {
    DEFAULT_DEDUP_WINDOW_SECS
}

fn default_include_heatmap() -> bool {
    true
}

/// Per-venue analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Venue capacity in people, used by the capacity alert rule
    #[serde(default = "default_estimated_capacity")]
    pub estimated_capacity: f64,

    #[serde(default)]
    pub thresholds: AlertThresholds,

    #[serde(default = "default_max_zones")]
    pub max_zones: usize,

    /// Heatmap cell size in pixels
    #[serde(default = "default_heatmap_grid_size")]
    pub heatmap_grid_size: u32,

    /// Window in which repeated alerts of one type are suppressed
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            estimated_capacity: default_estimated_capacity(),
            thresholds: AlertThresholds::default(),
            max_zones: default_max_zones(),
            heatmap_grid_size: default_heatmap_grid_size(),
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        ensure_positive("estimated_capacity", self.estimated_capacity)?;
        ensure_positive("max_zones", self.max_zones as f64)?;
        ensure_positive("heatmap_grid_size", self.heatmap_grid_size as f64)?;
        ensure_positive("dedup_window_secs", self.dedup_window_secs as f64)?;
        self.thresholds.validate()
    }

    fn dedup_window(&self) -> Duration {
        Duration::seconds(self.dedup_window_secs)
    }
}

/// Partial settings change; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub estimated_capacity: Option<f64>,
    #[serde(default)]
    pub thresholds: ThresholdOverrides,
    #[serde(default)]
    pub max_zones: Option<usize>,
    #[serde(default)]
    pub heatmap_grid_size: Option<u32>,
    #[serde(default)]
    pub dedup_window_secs: Option<i64>,
}

impl SettingsUpdate {
    /// Resulting settings; not validated
    pub fn apply_to(&self, settings: &MonitorSettings) -> MonitorSettings {
        MonitorSettings {
            estimated_capacity: self.estimated_capacity.unwrap_or(settings.estimated_capacity),
            thresholds: settings.thresholds.merged(&self.thresholds),
            max_zones: self.max_zones.unwrap_or(settings.max_zones),
            heatmap_grid_size: self.heatmap_grid_size.unwrap_or(settings.heatmap_grid_size),
            dedup_window_secs: self.dedup_window_secs.unwrap_or(settings.dedup_window_secs),
        }
    }
}

/// One frame of detections to analyse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub detections: Vec<Detection>,
    pub image_width: u32,
    pub image_height: u32,
    /// Upstream inference time; the local analysis time is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
    /// Build a heatmap and derive hotspots from it
    #[serde(default = "default_include_heatmap")]
    pub include_heatmap: bool,
}

impl FrameInput {
    pub fn new(detections: Vec<Detection>, image_width: u32, image_height: u32) -> Self {
        Self {
            detections,
            image_width,
            image_height,
            processing_time_ms: None,
            include_heatmap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub snapshot: Snapshot,
    pub zones: Vec<Zone>,
    /// Alerts accepted by the feed for this frame
    pub alerts: Vec<Alert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<Vec<Vec<f64>>>,
}

/// Crowd monitoring state for a single venue
#[derive(Debug, Clone)]
pub struct CrowdMonitor {
    venue_id: String,
    settings: MonitorSettings,
    history: SnapshotHistory,
    feed: AlertFeed,
    analytics: AnalyticsLog,
}

impl CrowdMonitor {
    pub fn new(venue_id: impl Into<String>, settings: MonitorSettings) -> Result<Self, AnalyticsError> {
        settings.validate()?;
        let feed = AlertFeed::new(settings.dedup_window());
        Ok(Self {
            venue_id: venue_id.into(),
            settings,
            history: SnapshotHistory::new(),
            feed,
            analytics: AnalyticsLog::new(),
        })
    }

    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn feed(&self) -> &AlertFeed {
        &self.feed
    }

    pub fn analytics(&self) -> &AnalyticsLog {
        &self.analytics
    }

    /// Apply a partial settings change. The current settings are kept when
    /// the result fails validation.
    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Result<&MonitorSettings, AnalyticsError> {
        let settings = update.apply_to(&self.settings);
        settings.validate()?;

        self.feed.set_dedup_window(settings.dedup_window());
        self.settings = settings;

        tracing::info!(
            venue_id = %self.venue_id,
            estimated_capacity = self.settings.estimated_capacity,
            "Monitor settings updated"
        );
        Ok(&self.settings)
    }

    /// Run the alert engine on a prebuilt snapshot. The feed is not involved.
    pub fn analyze(&mut self, snapshot: Snapshot) -> Vec<Alert> {
        analyze_and_generate_alerts(
            &mut self.history,
            snapshot,
            self.settings.estimated_capacity,
            &self.settings.thresholds,
        )
    }

    pub fn process_frame<R: Rng + ?Sized>(
        &mut self,
        input: &FrameInput,
        rng: &mut R,
    ) -> Result<FrameAnalysis, AnalyticsError> {
        self.process_frame_at(input, Utc::now(), rng)
    }

    /// Full analysis cycle for one frame observed at `now`
    pub fn process_frame_at<R: Rng + ?Sized>(
        &mut self,
        input: &FrameInput,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<FrameAnalysis, AnalyticsError> {
        validate_image_size(input.image_width, input.image_height)?;
        validate_detections(&input.detections, input.image_width, input.image_height)?;

        let start = Instant::now();
        let people_count = u32::try_from(input.detections.len()).unwrap_or(u32::MAX);

        let heatmap = if input.include_heatmap {
            let stage = Instant::now();
            let grid = generate_heatmap(
                &input.detections,
                input.image_width,
                input.image_height,
                self.settings.heatmap_grid_size,
            );
            observe_stage("heatmap", stage);
            Some(grid)
        } else {
            None
        };

        let snapshot = Snapshot::from_detections_at(
            now,
            people_count,
            heatmap.as_deref(),
            input.image_width,
            input.image_height,
        );

        let stage = Instant::now();
        let raised = self.analyze(snapshot.clone());
        let critical_raised = raised
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical);
        let alerts = self.feed.merge(raised, now);
        observe_stage("alerts", stage);

        let stage = Instant::now();
        let zones = auto_detect_zones(
            &input.detections,
            input.image_width,
            input.image_height,
            self.settings.max_zones,
            rng,
        );
        observe_stage("zones", stage);

        let processing_time_secs = input
            .processing_time_ms
            .map(|ms| ms / 1000.0)
            .unwrap_or_else(|| start.elapsed().as_secs_f64());
        let zone_data: BTreeMap<String, usize> = zones
            .iter()
            .map(|z| (z.name.clone(), z.detection_count))
            .collect();
        self.analytics.record(
            AnalyticsEntry::new(now, people_count, processing_time_secs)
                .with_alerts_triggered(critical_raised)
                .with_zone_data(zone_data),
        );

        CROWD_FRAMES_PROCESSED
            .with_label_values(&[self.venue_id.as_str()])
            .inc();
        CROWD_PEOPLE_COUNT
            .with_label_values(&[self.venue_id.as_str()])
            .set(people_count as i64);

        tracing::debug!(
            venue_id = %self.venue_id,
            people_count,
            zones = zones.len(),
            alerts = alerts.len(),
            "Frame processed"
        );

        Ok(FrameAnalysis {
            snapshot,
            zones,
            alerts,
            heatmap,
        })
    }

    pub fn dismiss_alert(&mut self, id: Uuid) -> bool {
        self.feed.dismiss(id)
    }

    pub fn dismiss_all_alerts(&mut self) -> usize {
        self.feed.dismiss_all()
    }

    /// Forget the snapshot history and alerts. The analytics log is kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.feed.clear();
        tracing::info!(venue_id = %self.venue_id, "Monitor history reset");
    }
}

fn observe_stage(stage: &str, started: Instant) {
    CROWD_FRAME_PROCESSING_TIME
        .with_label_values(&[stage])
        .observe(started.elapsed().as_secs_f64());
}
