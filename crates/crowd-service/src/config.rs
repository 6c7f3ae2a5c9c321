use crate::state::DEFAULT_MAX_VENUES;
use anyhow::{bail, Context, Result};
use crowd_analytics::{MonitorSettings, ThresholdOverrides};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8086";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Settings applied to every newly created venue monitor
    pub monitor: MonitorSettings,

    /// Most venues tracked at once; frames for further venues are refused
    pub max_venues: usize,
}

impl CrowdServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("CROWD_SERVICE_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let defaults = MonitorSettings::default();
        let overrides = ThresholdOverrides {
            density_surge_rate: parse_var(&lookup, "CROWD_DENSITY_SURGE_RATE")?,
            rapid_growth_rate: parse_var(&lookup, "CROWD_RAPID_GROWTH_RATE")?,
            high_density_threshold: parse_var(&lookup, "CROWD_HIGH_DENSITY_THRESHOLD")?,
            capacity_warning_percent: parse_var(&lookup, "CROWD_CAPACITY_WARNING_PERCENT")?,
            prediction_window_minutes: parse_var(&lookup, "CROWD_PREDICTION_WINDOW_MINUTES")?,
        };

        let monitor = MonitorSettings {
            estimated_capacity: parse_var(&lookup, "CROWD_DEFAULT_CAPACITY")?
                .unwrap_or(defaults.estimated_capacity),
            thresholds: defaults.thresholds.merged(&overrides),
            max_zones: parse_var(&lookup, "CROWD_MAX_ZONES")?.unwrap_or(defaults.max_zones),
            heatmap_grid_size: parse_var(&lookup, "CROWD_HEATMAP_GRID_SIZE")?
                .unwrap_or(defaults.heatmap_grid_size),
            dedup_window_secs: parse_var(&lookup, "CROWD_ALERT_DEDUP_SECS")?
                .unwrap_or(defaults.dedup_window_secs),
        };
        monitor
            .validate()
            .context("Invalid crowd monitor configuration")?;

        let max_venues = parse_var(&lookup, "CROWD_MAX_VENUES")?.unwrap_or(DEFAULT_MAX_VENUES);
        if max_venues == 0 {
            bail!("CROWD_MAX_VENUES must be greater than zero");
        }

        Ok(Self {
            bind_addr,
            monitor,
            max_venues,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {}: {:?}", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<CrowdServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CrowdServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8086");
        assert_eq!(config.monitor, MonitorSettings::default());
        assert_eq!(config.max_venues, DEFAULT_MAX_VENUES);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CROWD_SERVICE_ADDR", "127.0.0.1:9000"),
            ("CROWD_DEFAULT_CAPACITY", "250"),
            ("CROWD_MAX_ZONES", "3"),
            ("CROWD_ALERT_DEDUP_SECS", "60"),
            ("CROWD_RAPID_GROWTH_RATE", "4.5"),
            ("CROWD_MAX_VENUES", "20"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.monitor.estimated_capacity, 250.0);
        assert_eq!(config.monitor.max_zones, 3);
        assert_eq!(config.monitor.dedup_window_secs, 60);
        assert_eq!(config.monitor.thresholds.rapid_growth_rate, 4.5);
        assert_eq!(config.monitor.thresholds.density_surge_rate, 15.0);
        assert_eq!(config.max_venues, 20);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = config_from(&[("CROWD_MAX_ZONES", "five")]).unwrap_err();
        assert!(err.to_string().contains("CROWD_MAX_ZONES"));
    }

    #[test]
    fn test_non_positive_values_rejected() {
        assert!(config_from(&[("CROWD_DEFAULT_CAPACITY", "0")]).is_err());
        assert!(config_from(&[("CROWD_PREDICTION_WINDOW_MINUTES", "-2")]).is_err());
        assert!(config_from(&[("CROWD_MAX_VENUES", "0")]).is_err());
    }
}
