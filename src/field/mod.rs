//! Numeric fields sampled over the canvas at a reduced resolution.
//!
//! A field cell `(i, j)` covers the canvas point
//! `((i + 0.5) / ratio, (j + 0.5) / ratio)`; `ratio` is at most 1 and is
//! chosen so the field stays under a pixel budget. Consumers read fields in
//! canvas coordinates through [`Field::sample`], which keeps tiles seamless
//! because every tile samples the same untiled field.

pub mod blur;
pub mod contour;
pub mod density;
pub mod hillshading;
pub mod silhouette;
pub mod voronoi;

use rayon::prelude::*;

pub use density::{DensityField, density_field};
pub use hillshading::{HillshadingData, hillshading};
pub use silhouette::{Silhouette, silhouette};
pub use voronoi::{VoronoiField, voronoi_field};

/// How a value type is interpolated between the four cells around a point.
pub trait FieldValue: Copy + Send + Sync {
    fn interpolate(v00: Self, v10: Self, v01: Self, v11: Self, tx: f32, ty: f32) -> Self;
}

impl FieldValue for f32 {
    fn interpolate(v00: f32, v10: f32, v01: f32, v11: f32, tx: f32, ty: f32) -> f32 {
        let top = v00 + (v10 - v00) * tx;
        let bottom = v01 + (v11 - v01) * tx;
        top + (bottom - top) * ty
    }
}

// Identifiers do not blend: take the nearest of the four cells.
impl FieldValue for u32 {
    fn interpolate(v00: u32, v10: u32, v01: u32, v11: u32, tx: f32, ty: f32) -> u32 {
        match (tx < 0.5, ty < 0.5) {
            (true, true) => v00,
            (false, true) => v10,
            (true, false) => v01,
            (false, false) => v11,
        }
    }
}

impl FieldValue for u8 {
    fn interpolate(v00: u8, v10: u8, v01: u8, v11: u8, tx: f32, ty: f32) -> u8 {
        match (tx < 0.5, ty < 0.5) {
            (true, true) => v00,
            (false, true) => v10,
            (true, false) => v01,
            (false, false) => v11,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    pub values: Vec<T>,
    pub width: usize,
    pub height: usize,
    /// Field cells per canvas pixel.
    pub ratio: f32,
}

impl<T: FieldValue> Field<T> {
    pub fn filled(width: usize, height: usize, ratio: f32, value: T) -> Self {
        Self {
            values: vec![value; width * height],
            width,
            height,
            ratio,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.values[x + self.width * y]
    }

    /// Bilinear (or nearest, depending on `T`) sample at a canvas position.
    /// Positions outside the field clamp to the border cells.
    pub fn sample(&self, canvas_x: f32, canvas_y: f32) -> T {
        let fx = (canvas_x * self.ratio - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (canvas_y * self.ratio - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        T::interpolate(
            self.get(x0, y0),
            self.get(x1, y0),
            self.get(x0, y1),
            self.get(x1, y1),
            fx - x0 as f32,
            fy - y0 as f32,
        )
    }
}

/// Resamples `field` onto the pixel grid of a canvas window: cell `(i, j)`
/// of the result holds the sample at canvas point
/// `(x + i + 0.5, y + j + 0.5)`, so its ratio of 1 is relative to the
/// window origin. Tiles convert fields this way, which keeps neighbouring
/// tiles on one continuous surface.
pub fn resample<T: FieldValue>(field: &Field<T>, x: u32, y: u32, width: usize, height: usize) -> Field<T> {
    let (ox, oy) = (x as f32 + 0.5, y as f32 + 0.5);
    let values = (0..height)
        .into_par_iter()
        .flat_map_iter(|j| (0..width).map(move |i| field.sample(ox + i as f32, oy + j as f32)))
        .collect();
    Field {
        values,
        width,
        height,
        ratio: 1.0,
    }
}

/// Grid size and ratio for a canvas under a pixel budget. The ratio is only
/// ever lowered, and both axes share it so the aspect ratio is preserved.
pub fn grid_for_budget(canvas_width: u32, canvas_height: u32, max_pixels: u32) -> (usize, usize, f32) {
    let area = canvas_width as f64 * canvas_height as f64;
    let ratio = if area <= max_pixels as f64 || area == 0.0 {
        1.0
    } else {
        (max_pixels.max(1) as f64 / area).sqrt()
    };
    let width = ((canvas_width as f64 * ratio).floor() as usize).max(1);
    let height = ((canvas_height as f64 * ratio).floor() as usize).max(1);
    (width, height, ratio as f32)
}
