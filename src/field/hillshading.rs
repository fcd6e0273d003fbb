use super::{DensityField, Field};
use std::f32::consts::{FRAC_PI_2, PI};

#[derive(Debug, Clone, Copy)]
pub struct HillshadingParams {
    pub strength: f32,
    /// Radians.
    pub sun_azimuth: f32,
    /// Radians above the horizon.
    pub sun_elevation: f32,
}

/// Shaded relief of a density field treated as elevation. All maps share the
/// density field's grid.
#[derive(Debug, Clone)]
pub struct HillshadingData {
    pub reflectance: Field<f32>,
    /// Elevation normalised to `0..=1`.
    pub height: Field<f32>,
    pub dx: Field<f32>,
    pub dy: Field<f32>,
    /// Reflectance of a flat cell; shading is expressed relative to it.
    pub flat_reflectance: f32,
}

impl HillshadingData {
    /// Gradient at a canvas position (bilinear).
    pub fn gradient(&self, canvas_x: f32, canvas_y: f32) -> (f32, f32) {
        (
            self.dx.sample(canvas_x, canvas_y),
            self.dy.sample(canvas_x, canvas_y),
        )
    }

    /// Angle of steepest descent at a canvas position, `None` on flat ground.
    pub fn downhill_angle(&self, canvas_x: f32, canvas_y: f32) -> Option<f32> {
        let (dx, dy) = self.gradient(canvas_x, canvas_y);
        if dx.abs() < 1e-9 && dy.abs() < 1e-9 {
            None
        } else {
            Some((-dy).atan2(-dx))
        }
    }

    /// Shadow amount in `0..=1` relative to flat ground (0 = lit as flat).
    pub fn shadow(&self, canvas_x: f32, canvas_y: f32) -> f32 {
        self.shadow_of(self.reflectance.sample(canvas_x, canvas_y))
    }

    /// Shadow strength for a reflectance value already sampled.
    pub fn shadow_of(&self, r: f32) -> f32 {
        if self.flat_reflectance <= 0.0 {
            return 0.0;
        }
        1.0 - (r / self.flat_reflectance).clamp(0.0, 1.0)
    }
}

pub fn hillshading(density: &DensityField, params: HillshadingParams) -> HillshadingData {
    let src = &density.field;
    let (w, h) = (src.width, src.height);
    let scale = if density.max > 0.0 { 1.0 / density.max } else { 0.0 };
    let elevation = |x: usize, y: usize| src.values[x + w * y] * scale;

    let zenith = FRAC_PI_2 - params.sun_elevation;
    let (sin_zenith, cos_zenith) = zenith.sin_cos();

    let mut reflectance = Vec::with_capacity(w * h);
    let mut height = Vec::with_capacity(w * h);
    let mut dxs = Vec::with_capacity(w * h);
    let mut dys = Vec::with_capacity(w * h);
    for y in 0..h {
        let up = y.saturating_sub(1);
        let down = (y + 1).min(h - 1);
        for x in 0..w {
            let left = x.saturating_sub(1);
            let right = (x + 1).min(w - 1);
            let dx = (elevation(right, y) - elevation(left, y)) / 2.0;
            let dy = (elevation(x, down) - elevation(x, up)) / 2.0;
            let slope = (params.strength * (dx * dx + dy * dy).sqrt()).atan();
            let aspect = (-dy).atan2(-dx);
            let r = (PI - aspect - params.sun_azimuth).cos() * slope.sin() * sin_zenith
                + slope.cos() * cos_zenith;
            reflectance.push(r);
            height.push(elevation(x, y));
            dxs.push(dx);
            dys.push(dy);
        }
    }

    let wrap = |values: Vec<f32>| Field {
        values,
        width: w,
        height: h,
        ratio: src.ratio,
    };
    HillshadingData {
        reflectance: wrap(reflectance),
        height: wrap(height),
        dx: wrap(dxs),
        dy: wrap(dys),
        flat_reflectance: cos_zenith,
    }
}
