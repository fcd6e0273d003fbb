//! Marching squares over a scalar grid, producing closed rings.
//!
//! The grid is padded with one ring of below-threshold samples so every
//! contour closes, including shapes that touch the border.

use std::collections::HashMap;

/// Grid edge between two samples; `vertical` edges join `(x, y)` and
/// `(x, y + 1)`, horizontal ones `(x, y)` and `(x + 1, y)`. Coordinates are
/// in padded space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey {
    x: i32,
    y: i32,
    vertical: bool,
}

/// Closed rings at `threshold`, in field coordinates where sample `(i, j)`
/// sits at `(i + 0.5, j + 0.5)`. The last point of a ring is not repeated.
pub fn contour_rings(values: &[f32], width: usize, height: usize, threshold: f32) -> Vec<Vec<(f32, f32)>> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let sample = |x: i32, y: i32| -> f32 {
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            f32::NEG_INFINITY
        } else {
            values[x as usize + width * y as usize]
        }
    };
    let point_on = |key: EdgeKey| -> (f32, f32) {
        let (x1, y1) = if key.vertical { (key.x, key.y + 1) } else { (key.x + 1, key.y) };
        let a = sample(key.x, key.y);
        let b = sample(x1, y1);
        // crossings next to padding snap onto the border sample
        let t = if a.is_infinite() {
            1.0
        } else if b.is_infinite() {
            0.0
        } else if (b - a).abs() < f32::EPSILON {
            0.5
        } else {
            ((threshold - a) / (b - a)).clamp(0.0, 1.0)
        };
        let px = key.x as f32 + (x1 - key.x) as f32 * t + 0.5;
        let py = key.y as f32 + (y1 - key.y) as f32 * t + 0.5;
        (px, py)
    };

    let mut segments: Vec<(EdgeKey, EdgeKey)> = Vec::new();
    for y in -1..height as i32 {
        for x in -1..width as i32 {
            let tl = sample(x, y) >= threshold;
            let tr = sample(x + 1, y) >= threshold;
            let br = sample(x + 1, y + 1) >= threshold;
            let bl = sample(x, y + 1) >= threshold;
            let case = (tl as u8) << 3 | (tr as u8) << 2 | (br as u8) << 1 | bl as u8;
            let top = EdgeKey { x, y, vertical: false };
            let right = EdgeKey { x: x + 1, y, vertical: true };
            let bottom = EdgeKey { x, y: y + 1, vertical: false };
            let left = EdgeKey { x, y, vertical: true };
            let center_above = || {
                let c = [sample(x, y), sample(x + 1, y), sample(x + 1, y + 1), sample(x, y + 1)]
                    .iter()
                    .map(|v| if v.is_finite() { *v } else { threshold - 1.0 })
                    .sum::<f32>()
                    / 4.0;
                c >= threshold
            };
            match case {
                0 | 15 => {}
                1 | 14 => segments.push((left, bottom)),
                2 | 13 => segments.push((bottom, right)),
                3 | 12 => segments.push((left, right)),
                4 | 11 => segments.push((top, right)),
                6 | 9 => segments.push((top, bottom)),
                7 | 8 => segments.push((left, top)),
                5 => {
                    if center_above() {
                        segments.push((left, top));
                        segments.push((bottom, right));
                    } else {
                        segments.push((top, right));
                        segments.push((left, bottom));
                    }
                }
                10 => {
                    if center_above() {
                        segments.push((top, right));
                        segments.push((left, bottom));
                    } else {
                        segments.push((left, top));
                        segments.push((bottom, right));
                    }
                }
                _ => unreachable!(),
            }
        }
    }

    let mut by_edge: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
    for (i, (a, b)) in segments.iter().enumerate() {
        by_edge.entry(*a).or_default().push(i);
        by_edge.entry(*b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut rings = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (first, mut current) = segments[start];
        let mut ring = vec![point_on(first)];
        while current != first {
            ring.push(point_on(current));
            let next = by_edge
                .get(&current)
                .and_then(|list| list.iter().copied().find(|&i| !used[i]));
            let Some(next) = next else {
                break;
            };
            used[next] = true;
            let (a, b) = segments[next];
            current = if a == current { b } else { a };
        }
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }
    rings
}

/// Signed area of a ring (shoelace).
pub fn ring_area(ring: &[(f32, f32)]) -> f32 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Even-odd point-in-polygon test.
pub fn ring_contains(ring: &[(f32, f32)], x: f32, y: f32) -> bool {
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[(i + n - 1) % n];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}
