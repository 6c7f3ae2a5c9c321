use common::Detection;

/// Default heatmap cell size in pixels
pub const DEFAULT_GRID_SIZE: u32 = 20;

/// Largest grid, in cells, that will be allocated for one frame
pub const MAX_HEATMAP_CELLS: u64 = 1 << 20;

/// Neighbourhood radius (in cells) that each detection contributes to
const SPREAD_CELLS: i64 = 2;

/// Distance (in cells) at which a detection's contribution reaches zero
const FALLOFF_DISTANCE: f64 = 3.0;

/// Build a density heatmap from person detections.
///
/// The grid has `ceil(width / grid_size)` columns and
/// `ceil(height / grid_size)` rows. Every detection adds
/// `max(0, 1 - d / 3)` to each cell within a 5x5 neighbourhood of the cell
/// holding its box centre, where `d` is the distance in cells.
///
/// Returns an empty grid when the dimensions would exceed
/// [`MAX_HEATMAP_CELLS`].
pub fn generate_heatmap(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
    grid_size: u32,
) -> Vec<Vec<f64>> {
    if grid_size == 0 || image_width == 0 || image_height == 0 {
        return Vec::new();
    }

    let cols = image_width.div_ceil(grid_size) as u64;
    let rows = image_height.div_ceil(grid_size) as u64;
    let cells = cols.saturating_mul(rows);
    if cells > MAX_HEATMAP_CELLS {
        tracing::warn!(
            image_width,
            image_height,
            grid_size,
            cells,
            max_cells = MAX_HEATMAP_CELLS,
            "heatmap grid too large, skipping"
        );
        return Vec::new();
    }

    let cols = cols as usize;
    let rows = rows as usize;
    let mut grid = vec![vec![0.0; cols]; rows];

    let cell = grid_size as f64;
    for detection in detections {
        let (center_x, center_y) = detection.bbox.center();
        let col = (center_x / cell).floor() as i64;
        let row = (center_y / cell).floor() as i64;

        for dy in -SPREAD_CELLS..=SPREAD_CELLS {
            for dx in -SPREAD_CELLS..=SPREAD_CELLS {
                let r = row + dy;
                let c = col + dx;
                if r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 {
                    continue;
                }

                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let weight = (1.0 - distance / FALLOFF_DISTANCE).max(0.0);
                grid[r as usize][c as usize] += weight;
            }
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BoundingBox;

    fn person_at(cx: f64, cy: f64) -> Detection {
        Detection::person(0.9, BoundingBox::new(cx - 5.0, cy - 10.0, cx + 5.0, cy + 10.0))
    }

    #[test]
    fn test_grid_dimensions_round_up() {
        let grid = generate_heatmap(&[], 105, 40, 20);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 6);
        assert!(grid.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn test_single_detection_falloff() {
        // Centre lands in cell (row 5, col 5)
        let grid = generate_heatmap(&[person_at(110.0, 110.0)], 400, 400, 20);

        assert_eq!(grid[5][5], 1.0);
        assert!((grid[5][6] - 2.0 / 3.0).abs() < 1e-9);
        assert!((grid[5][7] - 1.0 / 3.0).abs() < 1e-9);
        // Corner of the 5x5 neighbourhood: distance sqrt(8) < 3
        assert!((grid[7][7] - (1.0 - 8f64.sqrt() / 3.0)).abs() < 1e-9);
        // Outside the neighbourhood
        assert_eq!(grid[5][8], 0.0);
    }

    #[test]
    fn test_contributions_accumulate_and_clip_at_edges() {
        let detections = vec![person_at(5.0, 5.0), person_at(5.0, 5.0)];
        let grid = generate_heatmap(&detections, 100, 100, 20);

        assert_eq!(grid[0][0], 2.0);
        // Only the in-bounds part of the neighbourhood is populated
        let populated = grid.iter().flatten().filter(|&&v| v > 0.0).count();
        assert_eq!(populated, 9);
    }

    #[test]
    fn test_oversized_grid_is_skipped() {
        let detections = [person_at(5.0, 5.0)];
        assert!(generate_heatmap(&detections, u32::MAX, u32::MAX, 20).is_empty());
        // 16384 x 16384 at one pixel per cell is far over the budget
        assert!(generate_heatmap(&detections, 16_384, 16_384, 1).is_empty());

        // Exactly at the budget is still built
        let grid = generate_heatmap(&detections, 1024, 1024, 1);
        assert_eq!(grid.len() * grid[0].len(), MAX_HEATMAP_CELLS as usize);
    }

    #[test]
    fn test_degenerate_inputs_yield_empty_grid() {
        assert!(generate_heatmap(&[person_at(5.0, 5.0)], 0, 100, 20).is_empty());
        assert!(generate_heatmap(&[person_at(5.0, 5.0)], 100, 100, 0).is_empty());
    }
}
