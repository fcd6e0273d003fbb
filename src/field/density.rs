use super::{Field, grid_for_budget};
use crate::ir::MapNode;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct DensityField {
    pub field: Field<f32>,
    pub max: f32,
}

impl DensityField {
    pub fn sample(&self, canvas_x: f32, canvas_y: f32) -> f32 {
        self.field.sample(canvas_x, canvas_y)
    }

    /// A field value scaled into `0..=1` by the field maximum.
    pub fn normalize(&self, value: f32) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (value / self.max).clamp(0.0, 1.0)
        }
    }
}

/// Kernel density of node mass over the canvas.
///
/// Each cell sums `w / (1 + (max(0, d - r) / spread)^2)` over the nodes (`d`
/// the distance to the node centre, `r` its radius, `w` its weight or 1) and
/// divides by the node count, so fields stay comparable across graphs of
/// different sizes. Node coordinates are canvas pixels; `spread` is in
/// canvas pixels too.
pub fn density_field(
    nodes: &[MapNode],
    weights: Option<&[f32]>,
    spread: f32,
    canvas: (u32, u32),
    max_pixels: u32,
) -> DensityField {
    let (width, height, ratio) = grid_for_budget(canvas.0, canvas.1, max_pixels);
    let spread = spread.max(f32::EPSILON);
    let count = nodes.len();
    let mut values = vec![0.0f32; width * height];
    if count > 0 {
        let masses: Vec<(f32, f32, f32, f32)> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let w = weights.and_then(|w| w.get(i).copied()).unwrap_or(1.0);
                (n.x, n.y, n.size, w)
            })
            .filter(|m| m.3 != 0.0)
            .collect();
        let norm = 1.0 / count as f32;
        values.par_chunks_mut(width).enumerate().for_each(|(j, row)| {
            let cy = (j as f32 + 0.5) / ratio;
            for (i, cell) in row.iter_mut().enumerate() {
                let cx = (i as f32 + 0.5) / ratio;
                let mut sum = 0.0f32;
                for &(x, y, r, w) in &masses {
                    let d = ((cx - x).powi(2) + (cy - y).powi(2)).sqrt();
                    let t = (d - r).max(0.0) / spread;
                    sum += w / (1.0 + t * t);
                }
                *cell = sum * norm;
            }
        });
    }
    let max = values.iter().copied().fold(0.0f32, f32::max);
    DensityField {
        field: Field {
            values,
            width,
            height,
            ratio,
        },
        max,
    }
}
