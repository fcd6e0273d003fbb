use super::{Field, grid_for_budget};
use crate::ir::{MapNode, NodeIndex};

/// Nearest-node ownership within node halos.
#[derive(Debug, Clone)]
pub struct VoronoiField {
    pub ids: Field<u32>,
    /// 0 inside the node body, 1 at the halo edge (and where unowned).
    pub dmod: Field<f32>,
}

impl VoronoiField {
    pub const NO_OWNER: u32 = u32::MAX;

    /// Owner and normalised distance at a canvas position.
    pub fn at(&self, canvas_x: f32, canvas_y: f32) -> (Option<NodeIndex>, f32) {
        let id = self.ids.sample(canvas_x, canvas_y);
        let owner = (id != Self::NO_OWNER).then_some(id);
        let dmod = if owner.is_some() {
            self.dmod.sample(canvas_x, canvas_y).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (owner, dmod)
    }

    /// Opacity multiplier of an edge `source -> target` at a canvas point:
    /// full inside an endpoint's body, fading linearly to `floor` at the edge
    /// of the endpoint's halo, `floor` anywhere else.
    pub fn edge_fade(&self, canvas_x: f32, canvas_y: f32, source: NodeIndex, target: NodeIndex, floor: f32) -> f32 {
        match self.at(canvas_x, canvas_y) {
            (Some(owner), dmod) if owner == source || owner == target => 1.0 - dmod * (1.0 - floor),
            _ => floor,
        }
    }
}

/// Builds the field by visiting, for each node, only the window
/// `center +- (radius + range)`. Cost is bounded by the halo areas rather
/// than by the canvas area. Conflicts keep the smallest `dmod`, then the
/// nearest centre (overlapping bodies all have `dmod` 0); exact ties keep
/// the earlier node.
pub fn voronoi_field(nodes: &[MapNode], range: f32, canvas: (u32, u32), max_pixels: u32) -> VoronoiField {
    let (width, height, ratio) = grid_for_budget(canvas.0, canvas.1, max_pixels);
    let mut ids = vec![VoronoiField::NO_OWNER; width * height];
    let mut dmods = vec![1.0f32; width * height];
    let mut dists = vec![f32::INFINITY; width * height];

    for (index, node) in nodes.iter().enumerate() {
        let cx = node.x * ratio;
        let cy = node.y * ratio;
        let r = node.size.max(0.0) * ratio;
        let halo = range.max(0.0) * ratio;
        let reach = r + halo;
        let x0 = (cx - reach).floor().max(0.0) as usize;
        let y0 = (cy - reach).floor().max(0.0) as usize;
        let x1 = ((cx + reach).ceil().max(0.0) as usize).min(width);
        let y1 = ((cy + reach).ceil().max(0.0) as usize).min(height);
        for y in y0..y1 {
            let fy = y as f32 + 0.5 - cy;
            for x in x0..x1 {
                let fx = x as f32 + 0.5 - cx;
                let d = (fx * fx + fy * fy).sqrt();
                if d > reach {
                    continue;
                }
                let dmod = if halo > 0.0 {
                    ((d - r) / halo).clamp(0.0, 1.0)
                } else if d <= r {
                    0.0
                } else {
                    1.0
                };
                let cell = x + width * y;
                let nearer = dmod == dmods[cell] && ids[cell] != VoronoiField::NO_OWNER && d < dists[cell];
                if dmod < dmods[cell] || nearer {
                    dmods[cell] = dmod;
                    dists[cell] = d;
                    ids[cell] = index as u32;
                }
            }
        }
    }

    let wrap_ids = Field {
        values: ids,
        width,
        height,
        ratio,
    };
    VoronoiField {
        ids: wrap_ids,
        dmod: Field {
            values: dmods,
            width,
            height,
            ratio,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Color;

    fn node(x: f32, y: f32, size: f32) -> MapNode {
        MapNode {
            id: format!("{x},{y}"),
            x,
            y,
            size,
            color: Color::BLACK,
            label: String::new(),
            important: false,
            attributes: Default::default(),
        }
    }

    #[test]
    fn far_apart_nodes_never_share_pixels() {
        let (radius, range) = (5.0, 10.0);
        // 2 * (radius + range) = 30 < distance 60
        let nodes = [node(30.0, 40.0, radius), node(90.0, 40.0, radius)];
        let field = voronoi_field(&nodes, range, (120, 80), 1_000_000);
        let mut owned = [0usize; 2];
        for y in 0..field.ids.height {
            for x in 0..field.ids.width {
                let id = field.ids.get(x, y);
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let near_a = ((px - 30.0).powi(2) + (py - 40.0).powi(2)).sqrt() <= radius + range;
                let near_b = ((px - 90.0).powi(2) + (py - 40.0).powi(2)).sqrt() <= radius + range;
                assert!(!(near_a && near_b));
                match id {
                    0 => {
                        assert!(near_a);
                        owned[0] += 1;
                    }
                    1 => {
                        assert!(near_b);
                        owned[1] += 1;
                    }
                    VoronoiField::NO_OWNER => {
                        assert!(!near_a || field.dmod.get(x, y) >= 1.0);
                        assert!(!near_b || field.dmod.get(x, y) >= 1.0);
                        assert_eq!(field.dmod.get(x, y), 1.0);
                    }
                    other => panic!("unexpected owner {other}"),
                }
            }
        }
        assert!(owned[0] > 0 && owned[0] == owned[1]);
    }

    #[test]
    fn dmod_is_zero_in_body_and_grows_through_halo() {
        let field = voronoi_field(&[node(50.5, 50.5, 4.0)], 10.0, (101, 101), 1_000_000);
        assert_eq!(field.dmod.get(50, 50), 0.0);
        assert_eq!(field.dmod.get(53, 50), 0.0);
        assert!((field.dmod.get(59, 50) - 0.5).abs() < 1e-6);
        assert_eq!(field.ids.get(59, 50), 0);
        assert_eq!(field.ids.get(80, 50), VoronoiField::NO_OWNER);
    }

    #[test]
    fn closer_node_wins_overlap() {
        let nodes = [node(40.5, 50.5, 2.0), node(60.5, 50.5, 2.0)];
        let field = voronoi_field(&nodes, 20.0, (101, 101), 1_000_000);
        assert_eq!(field.ids.get(45, 50), 0);
        assert_eq!(field.ids.get(55, 50), 1);
    }

    #[test]
    fn overlapping_bodies_go_to_the_nearer_centre() {
        let nodes = [node(40.5, 50.5, 20.0), node(60.5, 50.5, 20.0)];
        let field = voronoi_field(&nodes, 5.0, (101, 101), 1_000_000);
        assert_eq!(field.dmod.get(45, 50), 0.0);
        assert_eq!(field.dmod.get(55, 50), 0.0);
        assert_eq!(field.ids.get(45, 50), 0);
        assert_eq!(field.ids.get(55, 50), 1);
        // equidistant: the earlier node keeps it
        assert_eq!(field.ids.get(50, 50), 0);
    }

    #[test]
    fn edge_fade_rules() {
        let nodes = [node(20.5, 20.5, 2.0), node(80.5, 20.5, 2.0), node(50.5, 20.5, 2.0)];
        let field = voronoi_field(&nodes, 8.0, (101, 41), 1_000_000);
        // inside source body
        assert_eq!(field.edge_fade(20.5, 20.5, 0, 1, 0.1), 1.0);
        // halfway through source halo: 1 - 0.5 * 0.9
        assert!((field.edge_fade(26.5, 20.5, 0, 1, 0.1) - 0.55).abs() < 1e-5);
        // foreign node and empty space
        assert_eq!(field.edge_fade(50.5, 20.5, 0, 1, 0.1), 0.1);
        assert_eq!(field.edge_fade(40.5, 35.5, 0, 1, 0.1), 0.1);
    }

    #[test]
    fn downsampled_field_keeps_canvas_coordinates() {
        let field = voronoi_field(&[node(100.0, 100.0, 10.0)], 10.0, (200, 200), 100 * 100);
        assert!((field.ids.ratio - 0.5).abs() < 1e-6);
        assert_eq!(field.at(100.0, 100.0), (Some(0), 0.0));
        assert_eq!(field.at(10.0, 10.0), (None, 1.0));
    }
}
