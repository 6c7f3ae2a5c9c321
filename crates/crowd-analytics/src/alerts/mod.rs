pub mod engine;
pub mod thresholds;

pub use engine::{analyze_and_generate_alerts, density_change_rate, growth_rate, predict_future_count};
pub use thresholds::{AlertThresholds, ThresholdOverrides};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DensitySurge,
    RapidGrowth,
    HighConcentration,
    CapacityWarning,
    Bottleneck,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::DensitySurge => "density_surge",
            AlertType::RapidGrowth => "rapid_growth",
            AlertType::HighConcentration => "high_concentration",
            AlertType::CapacityWarning => "capacity_warning",
            AlertType::Bottleneck => "bottleneck",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "density_surge" => Ok(AlertType::DensitySurge),
            "rapid_growth" => Ok(AlertType::RapidGrowth),
            "high_concentration" => Ok(AlertType::HighConcentration),
            "capacity_warning" => Ok(AlertType::CapacityWarning),
            "bottleneck" => Ok(AlertType::Bottleneck),
            _ => Err(format!("Invalid alert type: {}", s)),
        }
    }
}

/// Location an alert refers to, in snapshot hotspot coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertZone {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// Predictive crowd warning. Only `dismissed` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub prediction: String,
    /// Estimated minutes until the predicted condition is reached
    pub time_to_impact: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<AlertZone>,
    #[serde(default)]
    pub dismissed: bool,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        prediction: impl Into<String>,
        time_to_impact: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            prediction: prediction.into(),
            time_to_impact,
            timestamp: Utc::now(),
            zone: None,
            dismissed: false,
        }
    }

    pub fn with_zone(mut self, zone: AlertZone) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.dismissed
    }
}
