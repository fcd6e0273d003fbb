use super::blur::gaussian_blur;
use super::contour::contour_rings;
use super::grid_for_budget;
use crate::ir::MapNode;

#[derive(Debug, Clone, Copy)]
pub struct SilhouetteParams {
    pub max_pixels: u32,
    /// Canvas pixels.
    pub blur_radius: f32,
    /// Canvas pixels added to each node radius.
    pub node_margin: f32,
    /// 0..1; higher values move the outline further from the nodes.
    pub swelling: f32,
}

/// Outline of a node group as closed rings in canvas coordinates, with the
/// size of the grid it was traced on.
#[derive(Debug, Clone, Default)]
pub struct Silhouette {
    pub contours: Vec<Vec<(f32, f32)>>,
    pub width: usize,
    pub height: usize,
    pub ratio: f32,
}

impl Silhouette {
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }
}

/// Stamps the selected nodes as discs, blurs them and traces the level set
/// `255 * (1 - swelling)` of the remapped alpha.
pub fn silhouette(
    nodes: &[MapNode],
    filter: impl Fn(usize, &MapNode) -> bool,
    canvas: (u32, u32),
    params: SilhouetteParams,
) -> Silhouette {
    let (width, height, ratio) = grid_for_budget(canvas.0, canvas.1, params.max_pixels);
    let empty = Silhouette {
        contours: Vec::new(),
        width,
        height,
        ratio,
    };
    let mut alpha = vec![0.0f32; width * height];
    let mut stamped = 0usize;
    for (index, node) in nodes.iter().enumerate() {
        if !filter(index, node) {
            continue;
        }
        stamped += 1;
        stamp_disc(
            &mut alpha,
            width,
            height,
            node.x * ratio,
            node.y * ratio,
            (node.size + params.node_margin).max(0.0) * ratio,
        );
    }
    if stamped == 0 {
        return empty;
    }

    let alpha = gaussian_blur(&alpha, width, height, params.blur_radius * ratio);
    let max = alpha.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return empty;
    }
    // dry/wet mix: mostly normalised, a little of the raw blur
    let levels: Vec<f32> = alpha
        .iter()
        .map(|a| (0.8 * a / max + 0.2 * a) * 255.0)
        .collect();
    let threshold = (255.0 * (1.0 - params.swelling)).clamp(1.0, 254.0);

    let contours = contour_rings(&levels, width, height, threshold)
        .into_iter()
        .map(|ring| ring.into_iter().map(|(x, y)| (x / ratio, y / ratio)).collect())
        .collect();
    Silhouette {
        contours,
        ..empty
    }
}

fn stamp_disc(values: &mut [f32], width: usize, height: usize, cx: f32, cy: f32, r: f32) {
    // tiny discs still cover the cell under their centre
    let r = r.max(0.5);
    let x0 = (cx - r).floor().max(0.0) as usize;
    let y0 = (cy - r).floor().max(0.0) as usize;
    let x1 = ((cx + r).ceil().max(0.0) as usize).min(width);
    let y1 = ((cy + r).ceil().max(0.0) as usize).min(height);
    for y in y0..y1 {
        let dy = y as f32 + 0.5 - cy;
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            if dx * dx + dy * dy <= r * r {
                values[x + width * y] = 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::contour::{ring_area, ring_contains};
    use crate::theme::Color;

    fn node(x: f32, y: f32, size: f32) -> MapNode {
        MapNode {
            id: format!("{x}-{y}"),
            x,
            y,
            size,
            color: Color::BLACK,
            label: String::new(),
            important: false,
            attributes: Default::default(),
        }
    }

    fn params(swelling: f32) -> SilhouetteParams {
        SilhouetteParams {
            max_pixels: 1_000_000,
            blur_radius: 4.0,
            node_margin: 2.0,
            swelling,
        }
    }

    #[test]
    fn single_node_is_enclosed() {
        let nodes = [node(60.0, 50.0, 8.0)];
        let shape = silhouette(&nodes, |_, _| true, (120, 100), params(0.5));
        assert_eq!(shape.contours.len(), 1);
        assert!(ring_contains(&shape.contours[0], 60.0, 50.0));
    }

    #[test]
    fn swelling_grows_the_outline() {
        let nodes = [node(60.0, 50.0, 8.0)];
        let tight = silhouette(&nodes, |_, _| true, (120, 100), params(0.2));
        let loose = silhouette(&nodes, |_, _| true, (120, 100), params(0.95));
        let area = |s: &Silhouette| ring_area(&s.contours[0]).abs();
        assert!(area(&loose) > area(&tight));
    }

    #[test]
    fn filter_selects_groups() {
        let nodes = [node(20.0, 20.0, 5.0), node(100.0, 80.0, 5.0)];
        let both = silhouette(&nodes, |_, _| true, (120, 100), params(0.5));
        assert_eq!(both.contours.len(), 2);
        let first = silhouette(&nodes, |i, _| i == 0, (120, 100), params(0.5));
        assert_eq!(first.contours.len(), 1);
        assert!(ring_contains(&first.contours[0], 20.0, 20.0));
        assert!(silhouette(&nodes, |_, _| false, (120, 100), params(0.5)).is_empty());
    }

    #[test]
    fn close_nodes_merge() {
        let nodes = [node(50.0, 50.0, 6.0), node(66.0, 50.0, 6.0)];
        let shape = silhouette(&nodes, |_, _| true, (120, 100), params(0.8));
        assert_eq!(shape.contours.len(), 1);
        assert!(ring_contains(&shape.contours[0], 58.0, 50.0));
    }

    #[test]
    fn downsampled_contours_come_back_in_canvas_space() {
        let nodes = [node(200.0, 150.0, 20.0)];
        let mut p = params(0.5);
        p.max_pixels = 100 * 75;
        let shape = silhouette(&nodes, |_, _| true, (400, 300), p);
        assert_eq!(shape.contours.len(), 1);
        assert!(ring_contains(&shape.contours[0], 200.0, 150.0));
        assert!(shape.contours[0].iter().all(|&(x, _)| x > 100.0 && x < 300.0));
    }
}
