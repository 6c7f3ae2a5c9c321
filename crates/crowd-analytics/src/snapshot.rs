use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of snapshots retained for trend analysis (10 minutes at 6/min)
pub const MAX_HISTORY_LENGTH: usize = 60;

/// Heatmap cells at or below this normalized intensity are not hotspots
pub const HOTSPOT_INTENSITY_THRESHOLD: f64 = 0.3;

/// Pixel area of one density unit (a 100x100 pixel square)
const DENSITY_UNIT_AREA: f64 = 10_000.0;

/// A heatmap-derived point of elevated crowd intensity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
    /// Normalized intensity (0.0 to 1.0)
    pub intensity: f64,
}

impl Hotspot {
    pub fn new(x: f64, y: f64, intensity: f64) -> Self {
        Self { x, y, intensity }
    }
}

/// One point-in-time crowd observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub people_count: u32,
    /// People per 100x100 pixel unit
    pub density: f64,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
}

impl Snapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        people_count: u32,
        density: f64,
        hotspots: Vec<Hotspot>,
    ) -> Self {
        Self {
            timestamp,
            people_count,
            density,
            hotspots,
        }
    }

    /// Build a snapshot stamped with the current time
    pub fn from_detections(
        people_count: u32,
        heatmap: Option<&[Vec<f64>]>,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self::from_detections_at(Utc::now(), people_count, heatmap, image_width, image_height)
    }

    /// Build a snapshot from a people count and an optional heatmap grid.
    ///
    /// Hotspots are the cells whose value, normalized against the grid
    /// maximum, exceeds [`HOTSPOT_INTENSITY_THRESHOLD`]. They are placed at
    /// the cell centre in pixel coordinates.
    pub fn from_detections_at(
        timestamp: DateTime<Utc>,
        people_count: u32,
        heatmap: Option<&[Vec<f64>]>,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let hotspots = heatmap
            .map(|grid| extract_hotspots(grid, image_width, image_height))
            .unwrap_or_default();

        let area = image_width as f64 * image_height as f64;
        let density = if area > 0.0 {
            people_count as f64 / (area / DENSITY_UNIT_AREA)
        } else {
            0.0
        };

        Self {
            timestamp,
            people_count,
            density,
            hotspots,
        }
    }
}

fn extract_hotspots(grid: &[Vec<f64>], image_width: u32, image_height: u32) -> Vec<Hotspot> {
    let rows = grid.len();
    let cols = grid.first().map(|row| row.len()).unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let max_value = grid
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let cell_width = image_width as f64 / cols as f64;
    let cell_height = image_height as f64 / rows as f64;

    let mut hotspots = Vec::new();
    for (row, cells) in grid.iter().enumerate() {
        for (col, &value) in cells.iter().enumerate() {
            let intensity = if max_value > 0.0 { value / max_value } else { 0.0 };
            if intensity > HOTSPOT_INTENSITY_THRESHOLD {
                hotspots.push(Hotspot {
                    x: col as f64 * cell_width + cell_width / 2.0,
                    y: row as f64 * cell_height + cell_height / 2.0,
                    intensity,
                });
            }
        }
    }

    hotspots
}

/// Bounded, time-ordered snapshot buffer. The oldest entry is evicted once
/// the length exceeds [`MAX_HISTORY_LENGTH`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotHistory {
    snapshots: VecDeque<Snapshot>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::with_capacity(MAX_HISTORY_LENGTH + 1),
        }
    }

    pub fn add(&mut self, snapshot: Snapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > MAX_HISTORY_LENGTH {
            self.snapshots.pop_front();
        }
    }

    /// Copy of the history, oldest first
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.iter().cloned().collect()
    }

    /// The last `n` snapshots (fewer if the history is shorter), oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Snapshot> {
        let skip = self.snapshots.len().saturating_sub(n);
        self.snapshots.iter().skip(skip)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot_at(minute: i64, people_count: u32) -> Snapshot {
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        Snapshot::new(start + Duration::minutes(minute), people_count, 0.0, vec![])
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = SnapshotHistory::new();
        for i in 0..100 {
            history.add(snapshot_at(i, i as u32));
        }

        let snapshots = history.snapshots();
        assert_eq!(snapshots.len(), MAX_HISTORY_LENGTH);
        assert_eq!(snapshots[0].people_count, 40);
        assert_eq!(snapshots[59].people_count, 99);
        assert!(snapshots
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_snapshots_is_a_copy() {
        let mut history = SnapshotHistory::new();
        history.add(snapshot_at(0, 1));

        let copy = history.snapshots();
        history.add(snapshot_at(1, 2));
        history.clear();

        assert_eq!(copy.len(), 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_recent_window() {
        let mut history = SnapshotHistory::new();
        for i in 0..8 {
            history.add(snapshot_at(i, i as u32));
        }

        let counts: Vec<u32> = history.recent(5).map(|s| s.people_count).collect();
        assert_eq!(counts, vec![3, 4, 5, 6, 7]);
        assert_eq!(history.recent(20).count(), 8);
        assert_eq!(history.latest().map(|s| s.people_count), Some(7));
    }

    #[test]
    fn test_density_per_hundred_pixel_square() {
        let snapshot = Snapshot::from_detections(50, None, 1000, 500);
        // 500_000 px = 50 units
        assert!((snapshot.density - 1.0).abs() < 1e-9);
        assert!(snapshot.hotspots.is_empty());
    }

    #[test]
    fn test_zero_area_density_is_zero() {
        let snapshot = Snapshot::from_detections(12, None, 0, 480);
        assert_eq!(snapshot.density, 0.0);
    }

    #[test]
    fn test_hotspot_extraction() {
        let grid = vec![
            vec![0.0, 1.0, 4.0],
            vec![2.0, 0.0, 1.0],
        ];
        let snapshot = Snapshot::from_detections(3, Some(grid.as_slice()), 300, 200);

        // Normalized: [0, .25, 1], [.5, 0, .25]
        assert_eq!(snapshot.hotspots.len(), 2);

        let top = snapshot.hotspots[0];
        assert_eq!((top.x, top.y), (250.0, 50.0));
        assert_eq!(top.intensity, 1.0);

        let second = snapshot.hotspots[1];
        assert_eq!((second.x, second.y), (50.0, 150.0));
        assert!((second.intensity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_heatmap_has_no_hotspots() {
        let grid = vec![vec![0.0; 4]; 4];
        let snapshot = Snapshot::from_detections(0, Some(grid.as_slice()), 400, 400);
        assert!(snapshot.hotspots.is_empty());

        let empty: Vec<Vec<f64>> = Vec::new();
        let snapshot = Snapshot::from_detections(0, Some(empty.as_slice()), 400, 400);
        assert!(snapshot.hotspots.is_empty());
    }
}
