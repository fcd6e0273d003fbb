//! Gaussian blur approximated by three box blurs.
//!
//! Box widths come from the usual "ideal width" derivation: pick odd widths
//! `wl` and `wu = wl + 2` and a count `m` of `wl` boxes so the summed variance
//! of the boxes matches `sigma^2`. Every box pass is a sliding-window sum,
//! horizontal then vertical, with border samples replicated so edges do not
//! darken.

use crate::raster::RasterLayer;
use rayon::prelude::*;

pub fn boxes_for_gauss(sigma: f32, n: usize) -> Vec<usize> {
    if sigma <= 0.0 || n == 0 {
        return Vec::new();
    }
    let nf = n as f64;
    let sigma = sigma as f64;
    let w_ideal = (12.0 * sigma * sigma / nf + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wl = wl.max(1);
    let wu = wl + 2;
    let wlf = wl as f64;
    let m_ideal = (12.0 * sigma * sigma - nf * wlf * wlf - 4.0 * nf * wlf - 3.0 * nf) / (-4.0 * wlf - 4.0);
    let m = m_ideal.round().clamp(0.0, nf) as usize;
    (0..n)
        .map(|i| if i < m { wl as usize } else { wu as usize })
        .collect()
}

/// Blurs a single-channel grid.
pub fn gaussian_blur(values: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    let mut current = values.to_vec();
    if width == 0 || height == 0 {
        return current;
    }
    let mut scratch = vec![0.0f32; current.len()];
    for box_width in boxes_for_gauss(sigma, 3) {
        let radius = (box_width - 1) / 2;
        if radius == 0 {
            continue;
        }
        box_blur_rows(&current, &mut scratch, width, radius);
        transpose(&scratch, &mut current, width, height);
        box_blur_rows(&current, &mut scratch, height, radius);
        transpose(&scratch, &mut current, height, width);
    }
    current
}

/// Blurs each channel of a premultiplied RGBA layer.
pub fn blur_layer(layer: &RasterLayer, sigma: f32) -> RasterLayer {
    let (w, h) = (layer.width() as usize, layer.height() as usize);
    let data = layer.data();
    let channels: Vec<Vec<f32>> = (0..4)
        .into_par_iter()
        .map(|c| {
            let plane: Vec<f32> = data.iter().skip(c).step_by(4).map(|v| *v as f32).collect();
            gaussian_blur(&plane, w, h, sigma)
        })
        .collect();
    let mut out = vec![0u8; data.len()];
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        let a = channels[3][i].round().clamp(0.0, 255.0);
        px[3] = a as u8;
        for c in 0..3 {
            // premultiplied colour may not exceed alpha
            px[c] = channels[c][i].round().clamp(0.0, a) as u8;
        }
    }
    RasterLayer::from_premultiplied(layer.width(), layer.height(), out).unwrap_or_else(|| layer.clone())
}

fn box_blur_rows(src: &[f32], dst: &mut [f32], width: usize, radius: usize) {
    let count = (2 * radius + 1) as f32;
    let last = width as isize - 1;
    src.par_chunks(width)
        .zip(dst.par_chunks_mut(width))
        .for_each(|(row, out)| {
            let at = |i: isize| row[i.clamp(0, last) as usize];
            let r = radius as isize;
            let mut acc: f32 = (-r..=r).map(at).sum();
            for (x, cell) in out.iter_mut().enumerate() {
                *cell = acc / count;
                let x = x as isize;
                acc += at(x + r + 1) - at(x - r);
            }
        });
}

fn transpose(src: &[f32], dst: &mut [f32], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            dst[y + height * x] = src[x + width * y];
        }
    }
}
