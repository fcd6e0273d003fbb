use std::f32::consts::{FRAC_PI_2, PI};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub x: f32,
    pub y: f32,
    /// Direction of travel, radians.
    pub angle: f32,
}

/// Evenly spaced samples a label is laid along, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPath {
    pub samples: Vec<PathSample>,
    pub step: f32,
}

impl LabelPath {
    pub fn length(&self) -> f32 {
        self.step * self.samples.len().saturating_sub(1) as f32
    }

    /// Interpolated position and heading at `distance` along the path,
    /// clamped to the ends.
    pub fn point_at(&self, distance: f32) -> Option<PathSample> {
        let first = *self.samples.first()?;
        if self.samples.len() == 1 || self.step <= 0.0 {
            return Some(first);
        }
        let pos = (distance / self.step).clamp(0.0, (self.samples.len() - 1) as f32);
        let i = (pos.floor() as usize).min(self.samples.len() - 2);
        let t = pos - i as f32;
        let (a, b) = (self.samples[i], self.samples[i + 1]);
        Some(PathSample {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
            angle: a.angle + wrap_angle(b.angle - a.angle) * t,
        })
    }

    pub fn is_inside(&self, width: f32, height: f32) -> bool {
        self.samples
            .iter()
            .any(|s| s.x >= 0.0 && s.y >= 0.0 && s.x <= width && s.y <= height)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PathParams {
    /// Canvas pixels between samples.
    pub step: f32,
    /// Largest turn per step, radians.
    pub max_curvature: f32,
    /// Largest slope of the heading either side of horizontal, radians.
    pub start_angle_range: f32,
    pub curved: bool,
    pub centered: bool,
    /// Canvas pixels between the node rim and the start of the path.
    pub node_gap: f32,
}

/// Folds an angle into `(-pi/2, pi/2]`, i.e. onto the rightward half-plane.
fn reading_angle(angle: f32) -> f32 {
    let a = wrap_angle(angle);
    if a > FRAC_PI_2 {
        a - PI
    } else if a <= -FRAC_PI_2 {
        a + PI
    } else {
        a
    }
}

/// Wraps into `(-pi, pi]`.
fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Keeps a heading inside the cone around its own horizontal direction.
fn clamp_heading(heading: f32, range: f32) -> f32 {
    let leftward = heading.cos() < 0.0;
    let folded = reading_angle(heading).clamp(-range, range);
    if leftward { wrap_angle(folded + PI) } else { folded }
}

/// Keeps a heading within `range` of a fixed horizontal `axis` (0 or pi).
fn clamp_to_axis(heading: f32, axis: f32, range: f32) -> f32 {
    wrap_angle(axis + wrap_angle(heading - axis).clamp(-range, range))
}

/// Turns `heading` toward `target` by at most `max_turn`.
fn steer(heading: f32, target: f32, max_turn: f32) -> f32 {
    let diff = wrap_angle(target - heading);
    wrap_angle(heading + diff.clamp(-max_turn, max_turn))
}

/// Walks `count` steps from `(x, y)` starting on `heading`. With `flow`
/// set, each step steers toward the direction `flow` reports at the
/// current point (offset by `bias` radians).
fn walk(
    x: f32,
    y: f32,
    heading: f32,
    count: usize,
    params: &PathParams,
    bias: f32,
    flow: &dyn Fn(f32, f32) -> Option<f32>,
) -> Vec<PathSample> {
    let mut samples = Vec::with_capacity(count + 1);
    let axis = if heading.cos() < 0.0 { PI } else { 0.0 };
    let (mut x, mut y, mut heading) = (x, y, heading);
    samples.push(PathSample { x, y, angle: heading });
    for _ in 0..count {
        x += params.step * heading.cos();
        y += params.step * heading.sin();
        if params.curved
            && let Some(target) = flow(x, y)
        {
            heading = steer(heading, target + bias, params.max_curvature);
            heading = clamp_to_axis(heading, axis, params.start_angle_range);
        }
        samples.push(PathSample { x, y, angle: heading });
    }
    samples
}

/// Builds the path a label of `text_length` pixels follows from a node at
/// `(x, y)` with radius `radius`.
///
/// The walk starts along the downhill direction reported by `downhill`,
/// clamped into the reading cone, and keeps steering downhill when curved
/// paths are enabled. Centred paths run through the node, others start
/// `node_gap` beyond its rim. The result always reads left to right.
pub fn build_label_path(
    x: f32,
    y: f32,
    radius: f32,
    text_length: f32,
    params: &PathParams,
    downhill: &dyn Fn(f32, f32) -> Option<f32>,
) -> Option<LabelPath> {
    if !(text_length > 0.0) || !(params.step > 0.0) {
        return None;
    }
    let heading = clamp_heading(downhill(x, y).unwrap_or(0.0), params.start_angle_range);

    let samples = if params.centered {
        let half = (text_length / 2.0 / params.step).ceil() as usize;
        let forward = walk(x, y, heading, half, params, 0.0, downhill);
        let backward = walk(x, y, wrap_angle(heading + PI), half, params, PI, downhill);
        // backward half runs from its far end to the centre, then forward
        let mut samples: Vec<PathSample> = backward
            .into_iter()
            .skip(1)
            .rev()
            .map(|s| PathSample {
                angle: wrap_angle(s.angle + PI),
                ..s
            })
            .collect();
        samples.extend(forward);
        samples
    } else {
        let offset = radius.max(0.0) + params.node_gap.max(0.0);
        let count = (text_length / params.step).ceil() as usize;
        walk(
            x + offset * heading.cos(),
            y + offset * heading.sin(),
            heading,
            count,
            params,
            0.0,
            downhill,
        )
    };

    let (first, last) = (samples.first()?, samples.last()?);
    let samples = if last.x < first.x {
        samples
            .into_iter()
            .rev()
            .map(|s| PathSample {
                angle: wrap_angle(s.angle + PI),
                ..s
            })
            .collect()
    } else {
        samples
    };
    Some(LabelPath {
        samples,
        step: params.step,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PathParams {
        PathParams {
            step: 2.0,
            max_curvature: 0.1,
            start_angle_range: 0.6,
            curved: true,
            centered: false,
            node_gap: 3.0,
        }
    }

    fn flat(_: f32, _: f32) -> Option<f32> {
        None
    }

    #[test]
    fn flat_ground_gives_horizontal_path_beside_node() {
        let path = build_label_path(100.0, 50.0, 5.0, 30.0, &params(), &flat).unwrap();
        assert_eq!(path.samples.len(), 16);
        assert!((path.samples[0].x - 108.0).abs() < 1e-4);
        assert!(path.samples.iter().all(|s| (s.y - 50.0).abs() < 1e-4));
        assert!(path.length() >= 30.0);
    }

    #[test]
    fn steep_start_is_clamped_into_cone() {
        let down = |_: f32, _: f32| Some(FRAC_PI_2 - 0.01);
        let mut p = params();
        p.curved = false;
        let path = build_label_path(0.0, 0.0, 0.0, 20.0, &p, &down).unwrap();
        let s = path.samples[0];
        assert!((s.angle - 0.6).abs() < 1e-4, "angle {}", s.angle);
    }

    #[test]
    fn leftward_paths_are_reversed() {
        let west = |_: f32, _: f32| Some(PI);
        let path = build_label_path(100.0, 50.0, 5.0, 30.0, &params(), &west).unwrap();
        let first = path.samples.first().unwrap();
        let last = path.samples.last().unwrap();
        assert!(first.x < last.x);
        // ends next to the node, on its left
        assert!((last.x - 92.0).abs() < 1e-3);
        assert!(path.samples.iter().all(|s| s.angle.cos() > 0.99));
    }

    #[test]
    fn curvature_is_bounded_per_step() {
        // flow rotates with position
        let swirl = |x: f32, y: f32| Some((y - 50.0).atan2(x - 100.0) + FRAC_PI_2);
        let mut p = params();
        p.start_angle_range = 1.5;
        let path = build_label_path(100.0, 50.0, 5.0, 80.0, &p, &swirl).unwrap();
        for pair in path.samples.windows(2) {
            let turn = wrap_angle(pair[1].angle - pair[0].angle).abs();
            assert!(turn <= p.max_curvature + 1e-4, "turn {turn}");
        }
    }

    #[test]
    fn centered_path_runs_through_node() {
        let mut p = params();
        p.centered = true;
        let path = build_label_path(40.0, 40.0, 5.0, 20.0, &p, &flat).unwrap();
        assert_eq!(path.samples.len(), 11);
        assert!((path.samples[5].x - 40.0).abs() < 1e-4);
        assert!((path.samples[0].x - 30.0).abs() < 1e-4);
        assert!((path.samples[10].x - 50.0).abs() < 1e-4);
    }

    #[test]
    fn point_at_interpolates() {
        let path = build_label_path(0.0, 0.0, 0.0, 10.0, &params(), &flat).unwrap();
        let mid = path.point_at(5.0).unwrap();
        assert!((mid.x - 8.0).abs() < 1e-4);
        assert_eq!(path.point_at(1000.0).unwrap(), *path.samples.last().unwrap());
        assert!(build_label_path(0.0, 0.0, 0.0, 0.0, &params(), &flat).is_none());
    }
}
