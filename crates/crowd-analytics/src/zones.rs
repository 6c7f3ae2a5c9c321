//! Dynamic zone detection.
//!
//! Detection centres are projected into normalized image space and grouped
//! with k-means. Zones are recomputed from scratch for every batch, so zone
//! identifiers are only meaningful within one result.

use common::Detection;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ZONES: usize = 5;

/// Upper bound on k-means refinement passes
pub const MAX_KMEANS_ITERATIONS: usize = 20;

/// Padding added around member points, in normalized units
pub const ZONE_PADDING: f64 = 0.08;

/// Point in normalized [0, 1] image space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Normalized zone rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ZoneBounds {
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.xmin && point.x <= self.xmax && point.y >= self.ymin && point.y <= self.ymax
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ZoneDensity {
    Low,
    Medium,
    High,
    Critical,
}

impl ZoneDensity {
    /// Bucket a zone by its share of all detections:
    /// <15% low, <30% medium, <50% high, otherwise critical
    pub fn from_share(count: usize, total: usize) -> Self {
        if total == 0 {
            return ZoneDensity::Low;
        }

        let percentage = count as f64 / total as f64 * 100.0;
        if percentage < 15.0 {
            ZoneDensity::Low
        } else if percentage < 30.0 {
            ZoneDensity::Medium
        } else if percentage < 50.0 {
            ZoneDensity::High
        } else {
            ZoneDensity::Critical
        }
    }

    /// Label used in zone names
    pub fn label(&self) -> &'static str {
        match self {
            ZoneDensity::Low => "Sparse",
            ZoneDensity::Medium => "Moderate",
            ZoneDensity::High => "Dense",
            ZoneDensity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for ZoneDensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneDensity::Low => write!(f, "low"),
            ZoneDensity::Medium => write!(f, "medium"),
            ZoneDensity::High => write!(f, "high"),
            ZoneDensity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Rank-based identifier ("zone_0" is the most populated)
    pub id: String,
    pub name: String,
    pub centroid: Point,
    pub bounds: ZoneBounds,
    pub detection_count: usize,
    pub density: ZoneDensity,
}

#[derive(Debug, Clone)]
struct Cluster {
    centroid: Point,
    points: Vec<Point>,
}

/// K-means over normalized points with centroids seeded from distinct input
/// points. Empty clusters are dropped from the result.
fn kmeans<R: Rng + ?Sized>(points: &[Point], k: usize, rng: &mut R) -> Vec<Cluster> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    if points.len() <= k {
        return points
            .iter()
            .map(|&point| Cluster {
                centroid: point,
                points: vec![point],
            })
            .collect();
    }

    let mut centroids: Vec<Point> = points.choose_multiple(rng, k).copied().collect();
    let mut assignments = vec![0usize; points.len()];

    for iteration in 0..MAX_KMEANS_ITERATIONS {
        let mut changed = false;

        for (i, point) in points.iter().enumerate() {
            let mut min_dist = f64::INFINITY;
            let mut closest = 0;
            for (j, centroid) in centroids.iter().enumerate() {
                let dist = point.distance(centroid);
                if dist < min_dist {
                    min_dist = dist;
                    closest = j;
                }
            }

            if assignments[i] != closest {
                assignments[i] = closest;
                changed = true;
            }
        }

        if !changed {
            tracing::trace!(iteration, "k-means converged");
            break;
        }

        for (j, centroid) in centroids.iter_mut().enumerate() {
            let (sum_x, sum_y, n) = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == j)
                .fold((0.0, 0.0, 0usize), |(sx, sy, n), (p, _)| (sx + p.x, sy + p.y, n + 1));

            if n > 0 {
                *centroid = Point::new(sum_x / n as f64, sum_y / n as f64);
            }
        }
    }

    let mut clusters: Vec<Cluster> = centroids
        .into_iter()
        .map(|centroid| Cluster {
            centroid,
            points: Vec::new(),
        })
        .collect();

    for (point, &assignment) in points.iter().zip(&assignments) {
        clusters[assignment].points.push(*point);
    }

    clusters.retain(|cluster| !cluster.points.is_empty());
    clusters
}

fn padded_bounds(points: &[Point]) -> ZoneBounds {
    let (mut xmin, mut ymin) = (f64::INFINITY, f64::INFINITY);
    let (mut xmax, mut ymax) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        xmin = xmin.min(p.x);
        ymin = ymin.min(p.y);
        xmax = xmax.max(p.x);
        ymax = ymax.max(p.y);
    }

    // Padding is clipped to the frame but never past a member point
    ZoneBounds {
        xmin: (xmin - ZONE_PADDING).max(0.0).min(xmin),
        ymin: (ymin - ZONE_PADDING).max(0.0).min(ymin),
        xmax: (xmax + ZONE_PADDING).min(1.0).max(xmax),
        ymax: (ymax + ZONE_PADDING).min(1.0).max(ymax),
    }
}

/// Group detections into at most `max_zones` named density zones.
///
/// The cluster count is `min(max_zones, max(1, ceil(n / 3)))`, so sparse
/// scenes get fewer zones. Zones are sorted by descending detection count
/// and named after their rank and density bucket, e.g. "Dense Zone 1".
pub fn auto_detect_zones<R: Rng + ?Sized>(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
    max_zones: usize,
    rng: &mut R,
) -> Vec<Zone> {
    if detections.is_empty() || image_width == 0 || image_height == 0 || max_zones == 0 {
        return Vec::new();
    }

    let width = image_width as f64;
    let height = image_height as f64;
    let points: Vec<Point> = detections
        .iter()
        .map(|d| {
            let (x, y) = d.normalized_center(width, height);
            Point::new(x, y)
        })
        .collect();

    let total = detections.len();
    let k = max_zones.min(total.div_ceil(3).max(1));

    let mut clusters = kmeans(&points, k, rng);
    clusters.sort_by(|a, b| b.points.len().cmp(&a.points.len()));

    let zones: Vec<Zone> = clusters
        .iter()
        .enumerate()
        .map(|(rank, cluster)| {
            let count = cluster.points.len();
            let density = ZoneDensity::from_share(count, total);
            Zone {
                id: format!("zone_{}", rank),
                name: format!("{} Zone {}", density.label(), rank + 1),
                centroid: cluster.centroid,
                bounds: padded_bounds(&cluster.points),
                detection_count: count,
                density,
            }
        })
        .collect();

    tracing::debug!(
        detections = total,
        requested_clusters = k,
        zones = zones.len(),
        "zones detected"
    );
    telemetry::metrics::CROWD_ZONES_DETECTED.observe(zones.len() as f64);

    zones
}

/// [`auto_detect_zones`] seeded from the thread-local RNG
pub fn auto_detect_zones_default(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
) -> Vec<Zone> {
    auto_detect_zones(
        detections,
        image_width,
        image_height,
        DEFAULT_MAX_ZONES,
        &mut rand::thread_rng(),
    )
}

/// Detections whose normalized centre falls inside the zone bounds
pub fn detections_in_zone<'a>(
    detections: &'a [Detection],
    zone: &Zone,
    image_width: u32,
    image_height: u32,
) -> Vec<&'a Detection> {
    if image_width == 0 || image_height == 0 {
        return Vec::new();
    }

    detections
        .iter()
        .filter(|d| {
            let (x, y) = d.normalized_center(image_width as f64, image_height as f64);
            zone.bounds.contains(&Point::new(x, y))
        })
        .collect()
}
