use crate::alerts::{Alert, AlertSeverity, AlertType};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use telemetry::metrics::CROWD_ALERTS_SUPPRESSED;
use uuid::Uuid;

/// Default window in which a second alert of the same type is suppressed
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 30;

/// Most alerts a feed retains
pub const MAX_FEED_ALERTS: usize = 500;

/// Alerts raised for a venue, in arrival order.
///
/// Dismissal only marks an alert. Once the feed holds more than
/// [`MAX_FEED_ALERTS`], the oldest dismissed alerts are evicted first, then
/// the oldest active ones.
#[derive(Debug, Clone)]
pub struct AlertFeed {
    alerts: Vec<Alert>,
    dedup_window: Duration,
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS))
    }
}

impl AlertFeed {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            alerts: Vec::new(),
            dedup_window,
        }
    }

    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    pub fn set_dedup_window(&mut self, dedup_window: Duration) {
        self.dedup_window = dedup_window;
    }

    /// Append new alerts, skipping any whose type already has an active
    /// alert younger than the dedup window. Returns the accepted alerts.
    pub fn merge(&mut self, new_alerts: Vec<Alert>, now: DateTime<Utc>) -> Vec<Alert> {
        let cutoff = now - self.dedup_window;
        let recent_types: HashSet<AlertType> = self
            .alerts
            .iter()
            .filter(|a| !a.dismissed && a.timestamp > cutoff)
            .map(|a| a.alert_type)
            .collect();

        let (accepted, suppressed): (Vec<Alert>, Vec<Alert>) = new_alerts
            .into_iter()
            .partition(|a| !recent_types.contains(&a.alert_type));

        for alert in &suppressed {
            CROWD_ALERTS_SUPPRESSED
                .with_label_values(&[alert.alert_type.as_str()])
                .inc();
            tracing::debug!(
                alert_type = %alert.alert_type,
                "Alert suppressed, same type raised recently"
            );
        }

        for alert in &accepted {
            tracing::info!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                "Crowd alert raised"
            );
        }

        self.alerts.extend(accepted.iter().cloned());
        self.evict_overflow();
        accepted
    }

    fn evict_overflow(&mut self) {
        let mut excess = self.alerts.len().saturating_sub(MAX_FEED_ALERTS);
        if excess == 0 {
            return;
        }

        self.alerts.retain(|alert| {
            if excess > 0 && alert.dismissed {
                excess -= 1;
                false
            } else {
                true
            }
        });
        if excess > 0 {
            self.alerts.drain(..excess);
        }
    }

    /// Mark one alert as dismissed. Returns false for unknown ids.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.dismissed = true;
                true
            }
            None => false,
        }
    }

    /// Dismiss every active alert, returning how many changed
    pub fn dismiss_all(&mut self) -> usize {
        let mut dismissed = 0;
        for alert in self.alerts.iter_mut().filter(|a| !a.dismissed) {
            alert.dismissed = true;
            dismissed += 1;
        }
        dismissed
    }

    pub fn active(&self) -> Vec<&Alert> {
        self.alerts.iter().filter(|a| a.is_active()).collect()
    }

    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn has_active_critical(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.is_active() && a.severity == AlertSeverity::Critical)
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
