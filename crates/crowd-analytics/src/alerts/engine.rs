use super::{Alert, AlertSeverity, AlertThresholds, AlertType, AlertZone};
use crate::hotspots::{cluster_hotspots, y_variance, HotspotCluster};
use crate::snapshot::{Snapshot, SnapshotHistory};
use telemetry::metrics::CROWD_ALERTS_GENERATED;

/// Number of most recent snapshots used for trend rates
const TREND_WINDOW: usize = 5;

/// Intensity at which a concentration alert becomes critical
const CRITICAL_CONCENTRATION: f64 = 0.9;

/// Capacity percentage at which a capacity alert becomes critical
const CRITICAL_CAPACITY_PERCENT: f64 = 95.0;

const CONCENTRATION_TIME_TO_IMPACT: f64 = 5.0;
const CONCENTRATION_ZONE_RADIUS: f64 = 50.0;

const BOTTLENECK_MIN_CLUSTERS: usize = 3;
const BOTTLENECK_MAX_Y_VARIANCE: f64 = 1000.0;
const BOTTLENECK_TIME_TO_IMPACT: f64 = 6.0;

/// Append `current` to the history and evaluate every alert rule against
/// the updated trend.
///
/// Rules are independent and each raises at most one alert, in the order
/// rapid growth, density surge, high concentration, capacity, bottleneck.
/// A non-positive `estimated_capacity` disables the capacity rule. Alerts
/// carry the timestamp of `current`.
pub fn analyze_and_generate_alerts(
    history: &mut SnapshotHistory,
    current: Snapshot,
    estimated_capacity: f64,
    thresholds: &AlertThresholds,
) -> Vec<Alert> {
    let people_count = current.people_count;
    let observed_at = current.timestamp;
    let clusters = cluster_hotspots(&current.hotspots);
    history.add(current);

    let growth = growth_rate(history);
    let density_change = density_change_rate(history);

    let mut alerts: Vec<Alert> = [
        rapid_growth_alert(history, growth, thresholds),
        density_surge_alert(density_change, thresholds),
        concentration_alert(&clusters, thresholds),
        capacity_alert(history, people_count, growth, estimated_capacity, thresholds),
        bottleneck_alert(&clusters),
    ]
    .into_iter()
    .flatten()
    .collect();

    for alert in &mut alerts {
        alert.timestamp = observed_at;
        CROWD_ALERTS_GENERATED
            .with_label_values(&[alert.alert_type.as_str(), alert.severity.as_str()])
            .inc();
    }

    tracing::debug!(
        people_count,
        growth_rate = growth,
        density_change_rate = density_change,
        hotspot_clusters = clusters.len(),
        alerts = alerts.len(),
        "Crowd snapshot analysed"
    );

    alerts
}

/// First and last snapshot of the trend window plus the minutes between them
fn trend_window(history: &SnapshotHistory) -> Option<(&Snapshot, &Snapshot, f64)> {
    let mut recent = history.recent(TREND_WINDOW);
    let first = recent.next()?;
    let last = recent.last()?;

    let minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
    if minutes == 0.0 {
        return None;
    }

    Some((first, last, minutes))
}

/// People per minute over the last five snapshots
pub fn growth_rate(history: &SnapshotHistory) -> f64 {
    trend_window(history)
        .map(|(first, last, minutes)| {
            (last.people_count as f64 - first.people_count as f64) / minutes
        })
        .unwrap_or(0.0)
}

/// Density change in percent per minute over the last five snapshots
pub fn density_change_rate(history: &SnapshotHistory) -> f64 {
    match trend_window(history) {
        Some((first, last, minutes)) if first.density != 0.0 => {
            let percent_change = (last.density - first.density) / first.density * 100.0;
            percent_change / minutes
        }
        _ => 0.0,
    }
}

/// Linear extrapolation of the latest people count, never below zero
pub fn predict_future_count(history: &SnapshotHistory, minutes_ahead: f64) -> f64 {
    let current = history
        .latest()
        .map(|s| s.people_count as f64)
        .unwrap_or(0.0);
    (current + growth_rate(history) * minutes_ahead).max(0.0)
}

/// Round halves towards positive infinity: 2.5 becomes 3, -2.5 becomes -2
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn severity_for(value: f64, threshold: f64) -> AlertSeverity {
    if value >= threshold * 2.0 {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

fn rapid_growth_alert(
    history: &SnapshotHistory,
    growth: f64,
    thresholds: &AlertThresholds,
) -> Option<Alert> {
    if growth < thresholds.rapid_growth_rate {
        return None;
    }

    let window = thresholds.prediction_window_minutes;
    let predicted = predict_future_count(history, window);

    Some(Alert::new(
        AlertType::RapidGrowth,
        severity_for(growth, thresholds.rapid_growth_rate),
        "Rapid Crowd Growth Detected",
        format!("Crowd increasing at {} people/minute", round_half_up(growth)),
        format!(
            "Expected {} people in {} minutes",
            round_half_up(predicted),
            window
        ),
        window,
    ))
}

fn density_surge_alert(change: f64, thresholds: &AlertThresholds) -> Option<Alert> {
    if change < thresholds.density_surge_rate {
        return None;
    }

    let time_to_impact = (thresholds.prediction_window_minutes
        - round_half_up(change / thresholds.density_surge_rate))
    .max(1.0);

    Some(Alert::new(
        AlertType::DensitySurge,
        severity_for(change, thresholds.density_surge_rate),
        "Density Surge Alert",
        format!("Density increasing {}% per minute", round_half_up(change)),
        format!(
            "Dangerous density levels expected in {} minutes",
            time_to_impact
        ),
        time_to_impact,
    ))
}

fn concentration_alert(clusters: &[HotspotCluster], thresholds: &AlertThresholds) -> Option<Alert> {
    // Clusters are sorted by intensity, so the first one is the most dangerous
    let dangerous: Vec<&HotspotCluster> = clusters
        .iter()
        .filter(|c| c.intensity >= thresholds.high_density_threshold)
        .collect();
    let top = dangerous.first()?;

    let severity = if top.intensity >= CRITICAL_CONCENTRATION {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    };
    let plural = if dangerous.len() > 1 { "s" } else { "" };

    Some(
        Alert::new(
            AlertType::HighConcentration,
            severity,
            "High Crowd Concentration",
            format!("{} high-density zone{} detected", dangerous.len(), plural),
            "Risk of crowd crush if concentration continues",
            CONCENTRATION_TIME_TO_IMPACT,
        )
        .with_zone(AlertZone {
            x: top.x,
            y: top.y,
            radius: CONCENTRATION_ZONE_RADIUS,
        }),
    )
}

fn capacity_alert(
    history: &SnapshotHistory,
    people_count: u32,
    growth: f64,
    capacity: f64,
    thresholds: &AlertThresholds,
) -> Option<Alert> {
    if !(capacity.is_finite() && capacity > 0.0) {
        return None;
    }

    let count = people_count as f64;
    let percent = count / capacity * 100.0;
    if percent < thresholds.capacity_warning_percent {
        return None;
    }

    let window = thresholds.prediction_window_minutes;
    let predicted_percent = predict_future_count(history, window) / capacity * 100.0;
    let minutes_to_capacity = if growth > 0.0 {
        round_half_up(((capacity - count) / growth).max(0.0))
    } else {
        window
    };

    let severity = if percent >= CRITICAL_CAPACITY_PERCENT {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    };

    let (prediction, time_to_impact) = if count >= capacity {
        ("Capacity already exceeded".to_string(), 0.0)
    } else if predicted_percent > 100.0 && growth > 0.0 {
        (
            format!(
                "Will exceed capacity in approximately {} minutes",
                minutes_to_capacity
            ),
            minutes_to_capacity,
        )
    } else {
        (
            format!(
                "Projected {}% in {} minutes",
                round_half_up(predicted_percent),
                window
            ),
            minutes_to_capacity,
        )
    };

    Some(Alert::new(
        AlertType::CapacityWarning,
        severity,
        "Venue Capacity Warning",
        format!(
            "Currently at {}% capacity ({}/{})",
            round_half_up(percent),
            people_count,
            capacity
        ),
        prediction,
        time_to_impact,
    ))
}

fn bottleneck_alert(clusters: &[HotspotCluster]) -> Option<Alert> {
    if clusters.len() < BOTTLENECK_MIN_CLUSTERS || y_variance(clusters) >= BOTTLENECK_MAX_Y_VARIANCE {
        return None;
    }

    Some(Alert::new(
        AlertType::Bottleneck,
        AlertSeverity::Warning,
        "Potential Bottleneck Detected",
        "Linear crowd formation detected - possible exit/entry congestion",
        "Flow restriction may cause backup in 5-7 minutes",
        BOTTLENECK_TIME_TO_IMPACT,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Hotspot;
    use chrono::{DateTime, Duration, Utc};

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn snapshot(minute: i64, people_count: u32, density: f64) -> Snapshot {
        Snapshot::new(
            start() + Duration::minutes(minute),
            people_count,
            density,
            vec![],
        )
    }

    fn history_with(counts: &[u32]) -> SnapshotHistory {
        let mut history = SnapshotHistory::new();
        for (minute, &count) in counts.iter().enumerate() {
            history.add(snapshot(minute as i64, count, 0.0));
        }
        history
    }

    fn of_type(alerts: &[Alert], alert_type: AlertType) -> Option<&Alert> {
        alerts.iter().find(|a| a.alert_type == alert_type)
    }

    #[test]
    fn test_rates_need_two_snapshots() {
        let history = history_with(&[40]);
        assert_eq!(growth_rate(&history), 0.0);
        assert_eq!(density_change_rate(&history), 0.0);
        assert_eq!(predict_future_count(&history, 6.0), 40.0);
        assert_eq!(predict_future_count(&SnapshotHistory::new(), 6.0), 0.0);
    }

    #[test]
    fn test_zero_elapsed_time_gives_zero_rates() {
        let mut history = SnapshotHistory::new();
        history.add(snapshot(0, 10, 1.0));
        history.add(snapshot(0, 50, 2.0));
        assert_eq!(growth_rate(&history), 0.0);
        assert_eq!(density_change_rate(&history), 0.0);
    }

    #[test]
    fn test_growth_uses_last_five_snapshots() {
        // 0, 100 then 10, 20, 30, 40, 50 one minute apart
        let history = history_with(&[0, 100, 10, 20, 30, 40, 50]);
        assert!((growth_rate(&history) - 10.0).abs() < 1e-9);
        assert!((predict_future_count(&history, 2.0) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_never_negative() {
        let history = history_with(&[50, 40, 30, 20, 10]);
        assert_eq!(predict_future_count(&history, 6.0), 0.0);
    }

    #[test]
    fn test_density_change_rate() {
        let mut history = SnapshotHistory::new();
        history.add(snapshot(0, 10, 0.5));
        history.add(snapshot(2, 20, 1.0));
        // +100% over 2 minutes
        assert!((density_change_rate(&history) - 50.0).abs() < 1e-9);

        let mut history = SnapshotHistory::new();
        history.add(snapshot(0, 0, 0.0));
        history.add(snapshot(1, 20, 1.0));
        assert_eq!(density_change_rate(&history), 0.0);
    }

    #[test]
    fn test_rapid_growth_warning_and_critical() {
        let thresholds = AlertThresholds {
            rapid_growth_rate: 5.0,
            ..Default::default()
        };
        let mut history = history_with(&[10, 15, 20, 25]);
        let alerts =
            analyze_and_generate_alerts(&mut history, snapshot(4, 35, 0.0), 100.0, &thresholds);

        // (35 - 10) / 4 = 6.25 people/minute
        let alert = of_type(&alerts, AlertType::RapidGrowth).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.message, "Crowd increasing at 6 people/minute");
        assert_eq!(alert.prediction, "Expected 73 people in 6 minutes");
        assert_eq!(alert.time_to_impact, 6.0);

        let thresholds = AlertThresholds {
            rapid_growth_rate: 3.0,
            ..Default::default()
        };
        let mut history = history_with(&[10, 15, 20, 25]);
        let alerts =
            analyze_and_generate_alerts(&mut history, snapshot(4, 35, 0.0), 100.0, &thresholds);
        let alert = of_type(&alerts, AlertType::RapidGrowth).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_capacity_exhaustion_prediction() {
        let mut history = history_with(&[65, 70, 75, 80]);
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(4, 85, 0.0),
            100.0,
            &AlertThresholds::default(),
        );

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.alert_type, AlertType::CapacityWarning);
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.message.contains("85% capacity (85/100)"));
        assert_eq!(
            alert.prediction,
            "Will exceed capacity in approximately 3 minutes"
        );
        assert_eq!(alert.time_to_impact, 3.0);
    }

    #[test]
    fn test_capacity_projection_without_growth() {
        let mut history = history_with(&[96, 96]);
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(2, 96, 0.0),
            100.0,
            &AlertThresholds::default(),
        );

        let alert = of_type(&alerts, AlertType::CapacityWarning).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.prediction, "Projected 96% in 6 minutes");
        assert_eq!(alert.time_to_impact, 6.0);
    }

    #[test]
    fn test_capacity_already_exceeded() {
        let mut history = history_with(&[100, 110]);
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(2, 120, 0.0),
            100.0,
            &AlertThresholds::default(),
        );

        let alert = of_type(&alerts, AlertType::CapacityWarning).unwrap();
        assert_eq!(alert.prediction, "Capacity already exceeded");
        assert_eq!(alert.time_to_impact, 0.0);
        assert!(alert.message.contains("120% capacity (120/100)"));
    }

    #[test]
    fn test_zero_capacity_disables_capacity_rule() {
        let mut history = SnapshotHistory::new();
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(0, 500, 0.0),
            0.0,
            &AlertThresholds::default(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_density_surge() {
        let mut history = SnapshotHistory::new();
        history.add(snapshot(0, 10, 1.0));
        // +40% in one minute against a 15%/min threshold
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(1, 10, 1.4),
            100.0,
            &AlertThresholds::default(),
        );

        let alert = of_type(&alerts, AlertType::DensitySurge).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.message, "Density increasing 40% per minute");
        // 6 - round(40 / 15) = 3
        assert_eq!(alert.time_to_impact, 3.0);
        assert_eq!(
            alert.prediction,
            "Dangerous density levels expected in 3 minutes"
        );
    }

    #[test]
    fn test_density_surge_time_to_impact_floor() {
        let mut history = SnapshotHistory::new();
        history.add(snapshot(0, 10, 1.0));
        let alerts = analyze_and_generate_alerts(
            &mut history,
            snapshot(1, 10, 3.0),
            100.0,
            &AlertThresholds::default(),
        );

        let alert = of_type(&alerts, AlertType::DensitySurge).unwrap();
        assert_eq!(alert.time_to_impact, 1.0);
    }

    #[test]
    fn test_high_concentration() {
        let hotspots = vec![
            Hotspot::new(100.0, 100.0, 0.95),
            Hotspot::new(120.0, 100.0, 0.6),
            Hotspot::new(500.0, 400.0, 0.75),
        ];
        let mut history = SnapshotHistory::new();
        let current = Snapshot::new(start(), 10, 0.0, hotspots);
        let alerts =
            analyze_and_generate_alerts(&mut history, current, 100.0, &AlertThresholds::default());

        let alert = of_type(&alerts, AlertType::HighConcentration).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.message, "2 high-density zones detected");
        assert_eq!(alert.time_to_impact, 5.0);

        let zone = alert.zone.unwrap();
        assert_eq!((zone.x, zone.y, zone.radius), (110.0, 100.0, 50.0));
    }

    #[test]
    fn test_single_concentration_warning() {
        let hotspots = vec![Hotspot::new(100.0, 100.0, 0.8)];
        let mut history = SnapshotHistory::new();
        let current = Snapshot::new(start(), 10, 0.0, hotspots);
        let alerts =
            analyze_and_generate_alerts(&mut history, current, 100.0, &AlertThresholds::default());

        let alert = of_type(&alerts, AlertType::HighConcentration).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.message, "1 high-density zone detected");
    }

    #[test]
    fn test_bottleneck_on_aligned_clusters() {
        let aligned = vec![
            Hotspot::new(0.0, 50.0, 0.5),
            Hotspot::new(100.0, 52.0, 0.5),
            Hotspot::new(200.0, 48.0, 0.5),
        ];
        let mut history = SnapshotHistory::new();
        let alerts = analyze_and_generate_alerts(
            &mut history,
            Snapshot::new(start(), 10, 0.0, aligned),
            100.0,
            &AlertThresholds::default(),
        );

        let alert = of_type(&alerts, AlertType::Bottleneck).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.time_to_impact, 6.0);
        assert!(of_type(&alerts, AlertType::HighConcentration).is_none());

        let scattered = vec![
            Hotspot::new(0.0, 0.0, 0.5),
            Hotspot::new(100.0, 500.0, 0.5),
            Hotspot::new(200.0, 1000.0, 0.5),
        ];
        let mut history = SnapshotHistory::new();
        let alerts = analyze_and_generate_alerts(
            &mut history,
            Snapshot::new(start(), 10, 0.0, scattered),
            100.0,
            &AlertThresholds::default(),
        );
        assert!(of_type(&alerts, AlertType::Bottleneck).is_none());
    }

    #[test]
    fn test_current_snapshot_is_appended() {
        let mut history = SnapshotHistory::new();
        analyze_and_generate_alerts(
            &mut history,
            snapshot(0, 3, 0.0),
            100.0,
            &AlertThresholds::default(),
        );
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|s| s.people_count), Some(3));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.4), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }
}
