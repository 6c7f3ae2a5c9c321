//! In-memory log of analysis cycles and the aggregate views built from it.
//!
//! Day and hour grouping uses UTC. Entries older than
//! [`ANALYTICS_RETENTION_DAYS`] are aged out as new ones arrive, and at most
//! [`MAX_ANALYTICS_ENTRIES`] are kept.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Widest query window; older entries are dropped
pub const ANALYTICS_RETENTION_DAYS: i64 = 30;

/// Upper bound on retained entries, oldest dropped first
pub const MAX_ANALYTICS_ENTRIES: usize = 100_000;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Hour-of-day buckets and their display labels
const HOUR_BUCKETS: [(u32, &str); 9] = [
    (6, "6AM"),
    (8, "8AM"),
    (10, "10AM"),
    (12, "12PM"),
    (14, "2PM"),
    (16, "4PM"),
    (18, "6PM"),
    (20, "8PM"),
    (22, "10PM"),
];

/// One recorded analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEntry {
    pub timestamp: DateTime<Utc>,
    pub people_count: u32,
    pub processing_time_secs: f64,
    /// True when the cycle raised at least one critical alert
    #[serde(default)]
    pub alerts_triggered: bool,
    /// Zone name to detection count
    #[serde(default)]
    pub zone_data: BTreeMap<String, usize>,
}

impl AnalyticsEntry {
    pub fn new(timestamp: DateTime<Utc>, people_count: u32, processing_time_secs: f64) -> Self {
        Self {
            timestamp,
            people_count,
            processing_time_secs,
            alerts_triggered: false,
            zone_data: BTreeMap::new(),
        }
    }

    pub fn with_alerts_triggered(mut self, alerts_triggered: bool) -> Self {
        self.alerts_triggered = alerts_triggered;
        self
    }

    pub fn with_zone_data(mut self, zone_data: BTreeMap<String, usize>) -> Self {
        self.zone_data = zone_data;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_analyses: usize,
    pub total_people_detected: u64,
    pub avg_processing_time_secs: f64,
    pub critical_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub day: String,
    /// Rounded mean people count
    pub count: u32,
    pub peak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: String,
    /// Rounded mean people count
    pub count: u32,
}

/// Summary plus the weekly and hourly views, as served by the HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub summary: AnalyticsSummary,
    pub weekly: Vec<WeeklyBucket>,
    pub hourly: Vec<HourlyBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsLog {
    entries: VecDeque<AnalyticsEntry>,
}

impl AnalyticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: AnalyticsEntry) {
        let cutoff = entry.timestamp - Duration::days(ANALYTICS_RETENTION_DAYS);
        if self.entries.front().is_some_and(|e| e.timestamp <= cutoff) {
            self.entries.retain(|e| e.timestamp > cutoff);
        }

        if self.entries.len() >= MAX_ANALYTICS_ENTRIES {
            let excess = self.entries.len() + 1 - MAX_ANALYTICS_ENTRIES;
            self.entries.drain(..excess);
        }

        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &VecDeque<AnalyticsEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Totals over every retained entry
    pub fn summary(&self) -> AnalyticsSummary {
        let total_analyses = self.entries.len();
        let total_people_detected = self.entries.iter().map(|e| e.people_count as u64).sum();
        let avg_processing_time_secs = if total_analyses > 0 {
            self.entries
                .iter()
                .map(|e| e.processing_time_secs)
                .sum::<f64>()
                / total_analyses as f64
        } else {
            0.0
        };
        let critical_alerts = self.entries.iter().filter(|e| e.alerts_triggered).count();

        AnalyticsSummary {
            total_analyses,
            total_people_detected,
            avg_processing_time_secs,
            critical_alerts,
        }
    }

    fn since(&self, now: DateTime<Utc>, period: Duration) -> Vec<&AnalyticsEntry> {
        let cutoff = now - period;
        self.entries.iter().filter(|e| e.timestamp > cutoff).collect()
    }

    pub fn last_day(&self, now: DateTime<Utc>) -> Vec<&AnalyticsEntry> {
        self.since(now, Duration::days(1))
    }

    pub fn last_week(&self, now: DateTime<Utc>) -> Vec<&AnalyticsEntry> {
        self.since(now, Duration::days(7))
    }

    pub fn last_month(&self, now: DateTime<Utc>) -> Vec<&AnalyticsEntry> {
        self.since(now, Duration::days(30))
    }

    /// Mean and peak people count per weekday over the last week, Monday first
    pub fn weekly(&self, now: DateTime<Utc>) -> Vec<WeeklyBucket> {
        let mut counts: Vec<Vec<u32>> = vec![Vec::new(); WEEKDAYS.len()];
        for entry in self.last_week(now) {
            let day = entry.timestamp.weekday().num_days_from_monday() as usize;
            counts[day].push(entry.people_count);
        }

        WEEKDAYS
            .iter()
            .zip(counts.iter())
            .map(|(day, counts)| WeeklyBucket {
                day: day.to_string(),
                count: rounded_mean(counts),
                peak: counts.iter().copied().max().unwrap_or(0),
            })
            .collect()
    }

    /// Mean people count per two-hour bucket over the last day.
    ///
    /// Each entry goes to the bucket whose hour is nearest its hour of day;
    /// ties go to the earlier bucket.
    pub fn hourly(&self, now: DateTime<Utc>) -> Vec<HourlyBucket> {
        let mut counts: Vec<Vec<u32>> = vec![Vec::new(); HOUR_BUCKETS.len()];
        for entry in self.last_day(now) {
            counts[nearest_hour_bucket(entry.timestamp.hour())].push(entry.people_count);
        }

        HOUR_BUCKETS
            .iter()
            .zip(counts.iter())
            .map(|((_, label), counts)| HourlyBucket {
                hour: label.to_string(),
                count: rounded_mean(counts),
            })
            .collect()
    }

    pub fn report(&self, now: DateTime<Utc>) -> AnalyticsReport {
        AnalyticsReport {
            summary: self.summary(),
            weekly: self.weekly(now),
            hourly: self.hourly(now),
        }
    }
}

fn nearest_hour_bucket(hour: u32) -> usize {
    let mut nearest = 0;
    let mut min_distance = u32::MAX;
    for (idx, (bucket_hour, _)) in HOUR_BUCKETS.iter().enumerate() {
        let distance = hour.abs_diff(*bucket_hour);
        if distance < min_distance {
            min_distance = distance;
            nearest = idx;
        }
    }
    nearest
}

fn rounded_mean(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let total: u64 = values.iter().map(|&v| v as u64).sum();
    (total as f64 / values.len() as f64).round() as u32
}
