use crate::snapshot::Hotspot;
use serde::{Deserialize, Serialize};

/// Hotspots closer than this (in pixels) to a running cluster centre are merged
pub const HOTSPOT_MERGE_DISTANCE: f64 = 100.0;

/// Group of nearby hotspots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotspotCluster {
    /// Running mean position of the merged hotspots
    pub x: f64,
    pub y: f64,
    /// Highest intensity among the merged hotspots
    pub intensity: f64,
    pub count: usize,
}

/// Greedy single-pass agglomeration of hotspots.
///
/// Each unvisited hotspot seeds a cluster that absorbs every later unvisited
/// hotspot within [`HOTSPOT_MERGE_DISTANCE`] of the cluster's current
/// centre. Clusters are returned by descending intensity.
pub fn cluster_hotspots(hotspots: &[Hotspot]) -> Vec<HotspotCluster> {
    let mut clusters = Vec::new();
    let mut visited = vec![false; hotspots.len()];

    for i in 0..hotspots.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seed = hotspots[i];
        let mut cluster = HotspotCluster {
            x: seed.x,
            y: seed.y,
            intensity: seed.intensity,
            count: 1,
        };

        for j in (i + 1)..hotspots.len() {
            if visited[j] {
                continue;
            }

            let candidate = hotspots[j];
            let dx = candidate.x - cluster.x;
            let dy = candidate.y - cluster.y;
            if (dx * dx + dy * dy).sqrt() < HOTSPOT_MERGE_DISTANCE {
                let n = cluster.count as f64;
                cluster.x = (cluster.x * n + candidate.x) / (n + 1.0);
                cluster.y = (cluster.y * n + candidate.y) / (n + 1.0);
                cluster.intensity = cluster.intensity.max(candidate.intensity);
                cluster.count += 1;
                visited[j] = true;
            }
        }

        clusters.push(cluster);
    }

    clusters.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    clusters
}

/// Population variance of the cluster y-coordinates (0 for an empty slice)
pub fn y_variance(clusters: &[HotspotCluster]) -> f64 {
    if clusters.is_empty() {
        return 0.0;
    }

    let n = clusters.len() as f64;
    let mean = clusters.iter().map(|c| c.y).sum::<f64>() / n;
    clusters
        .iter()
        .map(|c| {
            let diff = c.y - mean;
            diff * diff
        })
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(cluster_hotspots(&[]).is_empty());
        assert_eq!(y_variance(&[]), 0.0);
    }

    #[test]
    fn test_nearby_hotspots_merge() {
        let hotspots = vec![
            Hotspot::new(100.0, 100.0, 0.4),
            Hotspot::new(130.0, 100.0, 0.9),
            Hotspot::new(600.0, 600.0, 0.5),
        ];

        let clusters = cluster_hotspots(&hotspots);
        assert_eq!(clusters.len(), 2);

        // Sorted by intensity, the merged cluster keeps the max
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].intensity, 0.9);
        assert_eq!((clusters[0].x, clusters[0].y), (115.0, 100.0));
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_merge_distance_is_relative_to_running_centre() {
        // The third point is 150 from the seed but within 100 of the
        // centre after the second point is merged.
        let hotspots = vec![
            Hotspot::new(0.0, 0.0, 0.5),
            Hotspot::new(90.0, 0.0, 0.5),
            Hotspot::new(140.0, 0.0, 0.5),
        ];

        let clusters = cluster_hotspots(&hotspots);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 3);
    }

    #[test]
    fn test_boundary_distance_does_not_merge() {
        let hotspots = vec![Hotspot::new(0.0, 0.0, 0.5), Hotspot::new(100.0, 0.0, 0.5)];
        assert_eq!(cluster_hotspots(&hotspots).len(), 2);
    }

    #[test]
    fn test_y_variance() {
        let clusters: Vec<HotspotCluster> = [50.0, 52.0, 48.0]
            .iter()
            .map(|&y| HotspotCluster {
                x: 0.0,
                y,
                intensity: 0.5,
                count: 1,
            })
            .collect();

        assert!((y_variance(&clusters) - 8.0 / 3.0).abs() < 1e-9);
    }
}
