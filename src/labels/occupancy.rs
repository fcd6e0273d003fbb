use super::path::LabelPath;
use crate::field::{Field, grid_for_budget};

/// Shared collision raster for one placement pass. A cell is 1 once any
/// accepted label (or its node) covers it.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cells: Field<u8>,
}

impl OccupancyGrid {
    pub fn new(canvas: (u32, u32), max_pixels: u32) -> Self {
        let (width, height, ratio) = grid_for_budget(canvas.0, canvas.1, max_pixels);
        Self {
            cells: Field::filled(width, height, ratio, 0u8),
        }
    }

    pub fn width(&self) -> usize {
        self.cells.width
    }

    pub fn height(&self) -> usize {
        self.cells.height
    }

    pub fn ratio(&self) -> f32 {
        self.cells.ratio
    }

    pub fn is_free(&self, cells: &[u32]) -> bool {
        cells.iter().all(|&c| self.cells.values[c as usize] == 0)
    }

    pub fn mark(&mut self, cells: &[u32]) {
        for &c in cells {
            self.cells.values[c as usize] = 1;
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.values.iter().filter(|v| **v != 0).count()
    }

    /// Cells of a canvas-space disc. A disc smaller than a cell still covers
    /// the cell under its centre.
    fn push_disc(&self, out: &mut Vec<u32>, x: f32, y: f32, r: f32) {
        let ratio = self.cells.ratio;
        let (cx, cy, r) = (x * ratio, y * ratio, r.max(0.0) * ratio);
        let (w, h) = (self.cells.width as i64, self.cells.height as i64);
        let x0 = ((cx - r).floor() as i64).max(0);
        let y0 = ((cy - r).floor() as i64).max(0);
        let x1 = ((cx + r).ceil() as i64).min(w);
        let y1 = ((cy + r).ceil() as i64).min(h);
        for j in y0..y1 {
            let dy = j as f32 + 0.5 - cy;
            for i in x0..x1 {
                let dx = i as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r * r {
                    out.push((i + w * j) as u32);
                }
            }
        }
        let (ci, cj) = (cx.floor() as i64, cy.floor() as i64);
        if (0..w).contains(&ci) && (0..h).contains(&cj) {
            out.push((ci + w * cj) as u32);
        }
    }

    /// Sorted, de-duplicated cells swept by a label: a disc of `half_width`
    /// around every path sample plus the node's own disc.
    pub fn corridor_cells(&self, path: &LabelPath, half_width: f32, node: (f32, f32, f32)) -> Vec<u32> {
        let mut cells = Vec::new();
        for s in &path.samples {
            self.push_disc(&mut cells, s.x, s.y, half_width);
        }
        self.push_disc(&mut cells, node.0, node.1, node.2);
        cells.sort_unstable();
        cells.dedup();
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::path::PathSample;

    fn straight(x0: f32, y: f32, n: usize) -> LabelPath {
        LabelPath {
            samples: (0..n)
                .map(|i| PathSample {
                    x: x0 + i as f32 * 2.0,
                    y,
                    angle: 0.0,
                })
                .collect(),
            step: 2.0,
        }
    }

    #[test]
    fn corridor_covers_path_and_node() {
        let grid = OccupancyGrid::new((100, 100), 1_000_000);
        let cells = grid.corridor_cells(&straight(20.0, 50.0, 11), 3.0, (10.0, 50.0, 4.0));
        let has = |x: u32, y: u32| cells.binary_search(&(x + 100 * y)).is_ok();
        assert!(has(30, 50));
        assert!(has(10, 50));
        assert!(!has(30, 60));
        assert!(cells.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn marked_cells_block_later_corridors() {
        let mut grid = OccupancyGrid::new((100, 100), 1_000_000);
        let a = grid.corridor_cells(&straight(20.0, 50.0, 11), 3.0, (10.0, 50.0, 4.0));
        let b = grid.corridor_cells(&straight(30.0, 52.0, 11), 3.0, (60.0, 80.0, 4.0));
        let c = grid.corridor_cells(&straight(20.0, 10.0, 11), 3.0, (10.0, 10.0, 4.0));
        assert!(grid.is_free(&a));
        grid.mark(&a);
        assert!(!grid.is_free(&b));
        assert!(grid.is_free(&c));
        assert_eq!(grid.occupied_count(), a.len());
    }

    #[test]
    fn coarse_grid_maps_canvas_coordinates() {
        let grid = OccupancyGrid::new((400, 400), 100 * 100);
        assert!((grid.ratio() - 0.25).abs() < 1e-6);
        let cells = grid.corridor_cells(&straight(200.0, 200.0, 1), 0.1, (200.0, 200.0, 0.0));
        assert_eq!(cells, vec![50 + 100 * 50]);
    }
}
