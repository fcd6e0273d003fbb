//! Greedy, priority-ordered placement of node labels along curved paths.
//!
//! Labels are decided once per render pass on the full canvas: tiles only
//! draw the accepted set, so neighbouring tiles always agree.

pub mod occupancy;
pub mod path;
pub mod text;

pub use occupancy::OccupancyGrid;
pub use path::{LabelPath, PathParams, PathSample, build_label_path};
pub use text::{FontScale, font_weight, prepare_label_text};

use crate::config::Settings;
use crate::ir::{MapNode, NodeIndex};
use crate::text_metrics::measure_text_width;
use std::cmp::Ordering;

/// Half corridor width as a share of the font size.
const CORRIDOR_FONT_SHARE: f32 = 0.6;

#[derive(Debug, Clone)]
pub struct LabelParams {
    pub font_family: String,
    pub min_pt: f32,
    pub max_pt: f32,
    pub dpi: f32,
    /// Stroke thickness the weight should match, canvas pixels.
    pub thickness: f32,
    pub count: usize,
    pub max_length: usize,
    /// Extra clearance around glyphs, canvas pixels.
    pub margin: f32,
    pub max_pixels: u32,
    pub path: PathParams,
}

impl LabelParams {
    pub fn from_settings(settings: &Settings) -> Self {
        let l = &settings.labels;
        Self {
            font_family: l.label_font_family.clone(),
            min_pt: l.label_font_min_size,
            max_pt: l.label_font_max_size,
            dpi: settings.image.rendering_dpi,
            thickness: settings.mm(l.label_font_thickness),
            count: l.label_count,
            max_length: l.label_max_length,
            margin: settings.mm(l.label_margin),
            max_pixels: l.label_collision_resolution_max,
            path: PathParams {
                step: settings.mm(l.label_path_step),
                max_curvature: l.label_max_curvature,
                start_angle_range: l.label_start_angle_range,
                curved: l.label_curved_path,
                centered: l.label_path_center,
                node_gap: settings.mm(l.label_node_gap),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlacedLabel {
    pub node: NodeIndex,
    pub text: String,
    pub font_px: f32,
    pub weight: u16,
    pub text_width: f32,
    pub path: LabelPath,
    /// Occupancy cells the label claimed.
    pub corridor: Vec<u32>,
}

/// Accepted labels in priority order, plus what happened to the others.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    pub labels: Vec<PlacedLabel>,
    pub rejected: usize,
    pub over_budget: usize,
    pub skipped: usize,
}

/// Priority order: important first, then larger nodes, then left to right,
/// then input order.
pub fn priority_order(nodes: &[MapNode]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| {
        let (na, nb) = (&nodes[a], &nodes[b]);
        nb.important
            .cmp(&na.important)
            .then_with(|| nb.size.partial_cmp(&na.size).unwrap_or(Ordering::Equal))
            .then_with(|| na.x.partial_cmp(&nb.x).unwrap_or(Ordering::Equal))
    });
    order
}

/// Places labels greedily against a shared occupancy raster.
///
/// A label is accepted when its corridor touches no occupied cell, or
/// unconditionally when its node is important; accepted corridors are then
/// painted. Non-important acceptances stop at `params.count`.
pub fn place_labels(
    nodes: &[MapNode],
    canvas: (u32, u32),
    params: &LabelParams,
    downhill: &dyn Fn(f32, f32) -> Option<f32>,
) -> Placement {
    let mut placement = Placement::default();
    let mut grid = OccupancyGrid::new(canvas, params.max_pixels);
    let scale = FontScale::new(nodes, params.min_pt, params.max_pt, params.dpi);
    let mut budget_used = 0usize;

    for index in priority_order(nodes) {
        let node = &nodes[index];
        let text = prepare_label_text(&node.label, params.max_length);
        if text.is_empty() {
            continue;
        }
        if !node.important && budget_used >= params.count {
            placement.over_budget += 1;
            continue;
        }

        let font_px = scale.font_px(node.size);
        let weight = font_weight(params.thickness, font_px);
        let text_width = measure_text_width(&text, font_px, &params.font_family, weight);
        let Some(path) = build_label_path(node.x, node.y, node.size, text_width, &params.path, downhill) else {
            log::warn!("label of node {:?} has a zero-length path, skipped", node.id);
            placement.skipped += 1;
            continue;
        };
        if !path.is_inside(canvas.0 as f32, canvas.1 as f32) {
            log::warn!("label of node {:?} falls outside the canvas, skipped", node.id);
            placement.skipped += 1;
            continue;
        }

        let half_width = font_px * CORRIDOR_FONT_SHARE + params.margin;
        let corridor = grid.corridor_cells(&path, half_width, (node.x, node.y, node.size));
        if !node.important && !grid.is_free(&corridor) {
            log::debug!("label of node {:?} collides, dropped", node.id);
            placement.rejected += 1;
            continue;
        }
        grid.mark(&corridor);
        if !node.important {
            budget_used += 1;
        }
        placement.labels.push(PlacedLabel {
            node: index as NodeIndex,
            text,
            font_px,
            weight,
            text_width,
            path,
            corridor,
        });
    }
    log::debug!(
        "labels: {} placed, {} rejected, {} over budget, {} skipped",
        placement.labels.len(),
        placement.rejected,
        placement.over_budget,
        placement.skipped
    );
    placement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Color;
    use std::collections::HashSet;

    fn node(id: &str, x: f32, y: f32, size: f32, important: bool) -> MapNode {
        MapNode {
            id: id.to_string(),
            x,
            y,
            size,
            color: Color::BLACK,
            label: format!("label {id}"),
            important,
            attributes: Default::default(),
        }
    }

    fn params() -> LabelParams {
        let mut settings = Settings::default();
        settings.image.rendering_dpi = 72.0;
        LabelParams::from_settings(&settings)
    }

    fn flat(_: f32, _: f32) -> Option<f32> {
        None
    }

    #[test]
    fn priority_is_important_then_size_then_x() {
        let nodes = [
            node("a", 50.0, 0.0, 2.0, false),
            node("b", 10.0, 0.0, 2.0, false),
            node("c", 0.0, 0.0, 9.0, false),
            node("d", 90.0, 0.0, 1.0, true),
            node("e", 10.0, 0.0, 2.0, false),
        ];
        assert_eq!(priority_order(&nodes), vec![3, 2, 1, 4, 0]);
    }

    #[test]
    fn accepted_corridors_never_overlap() {
        let mut nodes = Vec::new();
        for i in 0..40 {
            let x = 40.0 + (i % 8) as f32 * 45.0;
            let y = 40.0 + (i / 8) as f32 * 18.0 + (i % 3) as f32 * 4.0;
            nodes.push(node(&format!("n{i}"), x, y, 2.0 + (i % 5) as f32, false));
        }
        let placement = place_labels(&nodes, (420, 160), &params(), &flat);
        assert!(!placement.labels.is_empty());
        assert!(placement.rejected > 0);
        let mut seen = HashSet::new();
        for label in &placement.labels {
            for cell in &label.corridor {
                assert!(seen.insert(*cell), "cell {cell} claimed twice");
            }
        }
    }

    #[test]
    fn coincident_nodes_keep_one_label_unless_both_important() {
        let nodes = [
            node("a", 100.0, 100.0, 4.0, false),
            node("b", 100.0, 100.0, 4.0, false),
            node("c", 300.0, 40.0, 4.0, false),
        ];
        let placement = place_labels(&nodes, (400, 200), &params(), &flat);
        let placed: Vec<NodeIndex> = placement.labels.iter().map(|l| l.node).collect();
        assert_eq!(placed.iter().filter(|&&n| n < 2).count(), 1);
        assert!(placed.contains(&2));

        let mut both = nodes.clone();
        both[0].important = true;
        both[1].important = true;
        let placement = place_labels(&both, (400, 200), &params(), &flat);
        assert_eq!(placement.labels.iter().filter(|l| l.node < 2).count(), 2);
    }

    #[test]
    fn budget_exempts_important_labels() {
        let nodes: Vec<MapNode> = (0..6)
            .map(|i| node(&format!("n{i}"), 30.0, 30.0 + i as f32 * 60.0, 3.0, i == 5))
            .collect();
        let mut p = params();
        p.count = 2;
        let placement = place_labels(&nodes, (400, 400), &p, &flat);
        assert_eq!(placement.labels.len(), 3);
        assert_eq!(placement.labels[0].node, 5);
        assert_eq!(placement.over_budget, 3);
    }

    #[test]
    fn zero_budget_places_only_important_labels() {
        let nodes: Vec<MapNode> = (0..6)
            .map(|i| node(&format!("n{i}"), 30.0, 30.0 + i as f32 * 60.0, 3.0, i == 1 || i == 4))
            .collect();
        let mut p = params();
        p.count = 0;
        let placement = place_labels(&nodes, (400, 400), &p, &flat);
        let mut placed: Vec<NodeIndex> = placement.labels.iter().map(|l| l.node).collect();
        placed.sort_unstable();
        assert_eq!(placed, vec![1, 4]);
        assert_eq!(placement.over_budget, 4);
        assert_eq!(placement.rejected, 0);
    }

    #[test]
    fn empty_and_offscreen_labels_are_skipped() {
        let mut quiet = node("q", 50.0, 50.0, 3.0, false);
        quiet.label = "   ".to_string();
        let far = node("f", -5000.0, 50.0, 3.0, false);
        let placement = place_labels(&[quiet, far], (200, 200), &params(), &flat);
        assert!(placement.labels.is_empty());
        assert_eq!(placement.skipped, 1);
    }
}
