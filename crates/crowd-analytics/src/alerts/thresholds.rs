use crate::error::{ensure_positive, AnalyticsError};
use serde::{Deserialize, Serialize};

/// Trigger levels for the predictive alert rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Density increase (% per minute) that triggers a surge alert
    #[serde(default = "default_density_surge_rate")]
    pub density_surge_rate: f64,

    /// People added per minute that triggers a growth alert
    #[serde(default = "default_rapid_growth_rate")]
    pub rapid_growth_rate: f64,

    /// Hotspot intensity (0.0 to 1.0) considered dangerous
    #[serde(default = "default_high_density_threshold")]
    pub high_density_threshold: f64,

    /// Percentage of estimated capacity that triggers a capacity alert
    #[serde(default = "default_capacity_warning_percent")]
    pub capacity_warning_percent: f64,

    /// How far ahead predictions look, in minutes
    #[serde(default = "default_prediction_window_minutes")]
    pub prediction_window_minutes: f64,
}

fn default_density_surge_rate() -> f64 {
    15.0
}

fn default_rapid_growth_rate() -> f64 {
    10.0
}

fn default_high_density_threshold() -> f64 {
    0.7
}

fn default_capacity_warning_percent() -> f64 {
    80.0
}

fn default_prediction_window_minutes() -> f64 {
    6.0
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            density_surge_rate: default_density_surge_rate(),
            rapid_growth_rate: default_rapid_growth_rate(),
            high_density_threshold: default_high_density_threshold(),
            capacity_warning_percent: default_capacity_warning_percent(),
            prediction_window_minutes: default_prediction_window_minutes(),
        }
    }
}

impl AlertThresholds {
    /// Apply overrides field by field; unset fields keep their current value
    pub fn merged(&self, overrides: &ThresholdOverrides) -> Self {
        Self {
            density_surge_rate: overrides.density_surge_rate.unwrap_or(self.density_surge_rate),
            rapid_growth_rate: overrides.rapid_growth_rate.unwrap_or(self.rapid_growth_rate),
            high_density_threshold: overrides
                .high_density_threshold
                .unwrap_or(self.high_density_threshold),
            capacity_warning_percent: overrides
                .capacity_warning_percent
                .unwrap_or(self.capacity_warning_percent),
            prediction_window_minutes: overrides
                .prediction_window_minutes
                .unwrap_or(self.prediction_window_minutes),
        }
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        ensure_positive("density_surge_rate", self.density_surge_rate)?;
        ensure_positive("rapid_growth_rate", self.rapid_growth_rate)?;
        ensure_positive("high_density_threshold", self.high_density_threshold)?;
        ensure_positive("capacity_warning_percent", self.capacity_warning_percent)?;
        ensure_positive("prediction_window_minutes", self.prediction_window_minutes)?;
        Ok(())
    }
}

/// Partial threshold configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density_surge_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rapid_growth_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_density_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_warning_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_window_minutes: Option<f64>,
}

impl ThresholdOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let thresholds = AlertThresholds::default();
        assert_eq!(thresholds.density_surge_rate, 15.0);
        assert_eq!(thresholds.rapid_growth_rate, 10.0);
        assert_eq!(thresholds.high_density_threshold, 0.7);
        assert_eq!(thresholds.capacity_warning_percent, 80.0);
        assert_eq!(thresholds.prediction_window_minutes, 6.0);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_partial_override_merges_field_by_field() {
        let overrides = ThresholdOverrides {
            rapid_growth_rate: Some(5.0),
            prediction_window_minutes: Some(3.0),
            ..Default::default()
        };

        let merged = AlertThresholds::default().merged(&overrides);
        assert_eq!(merged.rapid_growth_rate, 5.0);
        assert_eq!(merged.prediction_window_minutes, 3.0);
        assert_eq!(merged.density_surge_rate, 15.0);
        assert_eq!(merged.capacity_warning_percent, 80.0);
        assert!(!overrides.is_empty());
        assert!(ThresholdOverrides::default().is_empty());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let overrides: ThresholdOverrides =
            serde_json::from_str(r#"{"capacity_warning_percent": 90}"#).unwrap();
        assert_eq!(overrides.capacity_warning_percent, Some(90.0));
        assert_eq!(overrides.rapid_growth_rate, None);

        let thresholds: AlertThresholds = serde_json::from_str(r#"{"rapid_growth_rate": 4}"#).unwrap();
        assert_eq!(thresholds.rapid_growth_rate, 4.0);
        assert_eq!(thresholds.density_surge_rate, 15.0);
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let thresholds = AlertThresholds {
            rapid_growth_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(
            thresholds.validate(),
            Err(AnalyticsError::NonPositiveSetting {
                field: "rapid_growth_rate",
                value: 0.0
            })
        );
    }
}
