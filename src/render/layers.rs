//! The fixed stack of map layers. Every layer is a pure function of the
//! render context and a tile rectangle.

use super::context::RenderContext;
use super::text::{Align, TextStyle, draw_line, draw_on_path};
use crate::config::{HeatmapSettings, LayerToggles};
use crate::error::RenderError;
use crate::field::blur::blur_layer;
use crate::field::{DensityField, resample};
use crate::labels::font_weight;
use crate::raster::{BlendMode, Canvas, RasterLayer, TileRect, multiply_alpha};
use crate::theme::Color;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Heatmap,
    Hillshading,
    NetworkShapeFill,
    NetworkShapeContour,
    ClusterFills,
    ClusterContours,
    Edges,
    NodeShadows,
    Nodes,
    NodeLabels,
    ClusterLabels,
    ConnectedCloseness,
    Stats,
}

impl Layer {
    /// Bottom to top.
    pub const ORDER: [Layer; 14] = [
        Layer::Background,
        Layer::Heatmap,
        Layer::Hillshading,
        Layer::NetworkShapeFill,
        Layer::NetworkShapeContour,
        Layer::ClusterFills,
        Layer::ClusterContours,
        Layer::Edges,
        Layer::NodeShadows,
        Layer::Nodes,
        Layer::NodeLabels,
        Layer::ClusterLabels,
        Layer::ConnectedCloseness,
        Layer::Stats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Background => "background",
            Layer::Heatmap => "heatmap",
            Layer::Hillshading => "hillshading",
            Layer::NetworkShapeFill => "network_shape_fill",
            Layer::NetworkShapeContour => "network_shape_contour",
            Layer::ClusterFills => "cluster_fills",
            Layer::ClusterContours => "cluster_contours",
            Layer::Edges => "edges",
            Layer::NodeShadows => "node_shadows",
            Layer::Nodes => "nodes",
            Layer::NodeLabels => "node_labels",
            Layer::ClusterLabels => "cluster_labels",
            Layer::ConnectedCloseness => "connected_closeness",
            Layer::Stats => "stats",
        }
    }

    pub fn enabled(self, toggles: &LayerToggles) -> bool {
        match self {
            Layer::Background => toggles.layer_background,
            Layer::Heatmap => toggles.layer_heatmap,
            Layer::Hillshading => toggles.layer_hillshading,
            Layer::NetworkShapeFill => toggles.layer_network_shape_fill,
            Layer::NetworkShapeContour => toggles.layer_network_shape_contour,
            Layer::ClusterFills => toggles.layer_cluster_fills,
            Layer::ClusterContours => toggles.layer_cluster_contours,
            Layer::Edges => toggles.layer_edges,
            Layer::NodeShadows => toggles.layer_node_shadows,
            Layer::Nodes => toggles.layer_nodes,
            Layer::NodeLabels => toggles.layer_node_labels,
            Layer::ClusterLabels => toggles.layer_cluster_labels,
            Layer::ConnectedCloseness => toggles.layer_connected_closeness,
            Layer::Stats => toggles.layer_stats,
        }
    }

    /// How the layer is composited onto the layers below it.
    pub fn blend(self) -> BlendMode {
        match self {
            Layer::Heatmap => BlendMode::HardLight,
            Layer::Hillshading | Layer::NodeShadows => BlendMode::Multiply,
            _ => BlendMode::Normal,
        }
    }

    /// Builds the shared fields this layer reads, so drawing only fetches.
    pub fn prepare(self, ctx: &RenderContext<'_>) {
        match self {
            Layer::Heatmap => {
                ctx.heatmap_density();
            }
            Layer::Hillshading => {
                ctx.hillshading();
            }
            Layer::NetworkShapeFill | Layer::NetworkShapeContour => {
                ctx.network_silhouette();
            }
            Layer::ClusterFills | Layer::ClusterContours | Layer::ClusterLabels => {
                ctx.cluster_shapes();
            }
            Layer::Edges => {
                if !ctx.edges.is_empty() {
                    ctx.voronoi();
                }
            }
            Layer::NodeLabels => {
                ctx.labels();
            }
            Layer::ConnectedCloseness | Layer::Stats => {
                ctx.closeness();
            }
            Layer::Background | Layer::NodeShadows | Layer::Nodes => {}
        }
    }

    pub fn draw(self, ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
        match self {
            Layer::Background => background(ctx, rect),
            Layer::Heatmap => heatmap(ctx, rect),
            Layer::Hillshading => hillshading(ctx, rect),
            Layer::NetworkShapeFill => network_shape(ctx, rect, true),
            Layer::NetworkShapeContour => network_shape(ctx, rect, false),
            Layer::ClusterFills => cluster_shapes(ctx, rect, true),
            Layer::ClusterContours => cluster_shapes(ctx, rect, false),
            Layer::Edges => edges(ctx, rect),
            Layer::NodeShadows => node_shadows(ctx, rect),
            Layer::Nodes => nodes(ctx, rect),
            Layer::NodeLabels => node_labels(ctx, rect),
            Layer::ClusterLabels => cluster_labels(ctx, rect),
            Layer::ConnectedCloseness => closeness_legend(ctx, rect),
            Layer::Stats => stats(ctx, rect),
        }
    }
}

fn empty_canvas(rect: TileRect) -> RenderError {
    RenderError::EmptyCanvas {
        width: rect.width,
        height: rect.height,
    }
}

fn background(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    RasterLayer::filled(rect.width, rect.height, ctx.settings.image.background_color).ok_or_else(|| empty_canvas(rect))
}

/// Density mapped onto the low..high colour ramp.
pub fn heatmap_layer(
    density: &DensityField,
    settings: &HeatmapSettings,
    rect: TileRect,
) -> Result<RasterLayer, RenderError> {
    let (low, high, alpha) = (
        settings.heatmap_color_low,
        settings.heatmap_color_high,
        settings.heatmap_alpha,
    );
    let values = resample(&density.field, rect.x, rect.y, rect.width as usize, rect.height as usize);
    RasterLayer::from_fn(rect.width, rect.height, |px, py| {
        let t = density.normalize(values.get(px as usize, py as usize));
        low.lerp(high, t).with_alpha(alpha)
    })
    .ok_or_else(|| empty_canvas(rect))
}

fn heatmap(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    heatmap_layer(ctx.heatmap_density(), &ctx.settings.heatmap, rect)
}

fn hillshading(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let shading = ctx.hillshading();
    let h = &ctx.settings.hillshading;
    let (w, hgt) = (rect.width as usize, rect.height as usize);
    let reflectance = resample(&shading.reflectance, rect.x, rect.y, w, hgt);
    let elevation = h
        .hillshading_hypsometric_gradient
        .then(|| resample(&shading.height, rect.x, rect.y, w, hgt));
    RasterLayer::from_fn(rect.width, rect.height, |px, py| {
        let (i, j) = (px as usize, py as usize);
        let tint = match &elevation {
            Some(elevation) => h
                .hillshading_low_color
                .lerp(h.hillshading_high_color, elevation.get(i, j)),
            None => Color::WHITE,
        };
        tint.lerp(h.hillshading_color, shading.shadow_of(reflectance.get(i, j)) * h.hillshading_alpha)
    })
    .ok_or_else(|| empty_canvas(rect))
}

fn network_shape(ctx: &RenderContext<'_>, rect: TileRect, fill: bool) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let shape = ctx.network_silhouette();
    let s = &ctx.settings.silhouette;
    if fill {
        canvas.fill_rings(&shape.contours, s.network_shape_fill_color);
    } else {
        canvas.stroke_rings(
            &shape.contours,
            ctx.settings.mm(s.network_shape_contour_thickness),
            s.network_shape_contour_color,
        );
    }
    Ok(canvas.finish())
}

fn cluster_shapes(ctx: &RenderContext<'_>, rect: TileRect, fill: bool) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let s = &ctx.settings.silhouette;
    for shape in ctx.cluster_shapes() {
        let color = shape.modality.color;
        if fill {
            canvas.fill_rings(&shape.silhouette.contours, color.with_alpha(s.cluster_fill_alpha));
        } else {
            canvas.stroke_rings(
                &shape.silhouette.contours,
                ctx.settings.mm(s.cluster_contour_thickness),
                color.with_alpha(s.cluster_contour_alpha),
            );
        }
    }
    Ok(canvas.finish())
}

/// Edges are cut into short pieces whose opacity follows the Voronoi
/// fade, so an edge is only solid near its own endpoints.
fn edges(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let e = &ctx.settings.edges;
    let width = ctx.settings.mm(e.edge_thickness);
    let piece = ctx.settings.mm(e.edge_segment_length).max(0.5);
    if width <= 0.0 || ctx.edges.is_empty() {
        return Ok(canvas.finish());
    }
    let voronoi = ctx.voronoi();
    for edge in ctx.edges.iter().filter(|edge| edge.source != edge.target) {
        let a = &ctx.nodes[edge.source as usize];
        let b = &ctx.nodes[edge.target as usize];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let length = (dx * dx + dy * dy).sqrt();
        let (mx, my) = ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        if length <= 0.0 || !canvas.touches(mx, my, length / 2.0 + width) {
            continue;
        }
        let color = e.edge_color.unwrap_or(b.color);
        let count = (length / piece).ceil().max(1.0) as usize;
        for k in 0..count {
            let t0 = k as f32 / count as f32;
            let t1 = (k + 1) as f32 / count as f32;
            let p0 = (a.x + dx * t0, a.y + dy * t0);
            let p1 = (a.x + dx * t1, a.y + dy * t1);
            let (cx, cy) = ((p0.0 + p1.0) / 2.0, (p0.1 + p1.1) / 2.0);
            if !canvas.touches(cx, cy, length / count as f32 + width) {
                continue;
            }
            let fade = voronoi.edge_fade(cx, cy, edge.source, edge.target, e.edge_fade_floor);
            let alpha = e.edge_alpha * edge.opacity * fade;
            if alpha <= 0.0 {
                continue;
            }
            canvas.stroke_line(p0, p1, width, color.with_alpha(alpha));
        }
    }
    Ok(canvas.finish())
}

/// Node discs blurred on a canvas padded by three sigmas, so shadows of
/// nodes just outside the tile still reach into it.
fn node_shadows(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let n = &ctx.settings.nodes;
    let sigma = ctx.settings.mm(n.node_shadow_blur).max(0.0);
    let pad = (3.0 * sigma).ceil() as u32;
    let mut canvas = Canvas::with_origin(
        rect.width + 2 * pad,
        rect.height + 2 * pad,
        (rect.x as f32 - pad as f32, rect.y as f32 - pad as f32),
    )?;
    for node in ctx.nodes {
        canvas.fill_circle(node.x, node.y, node.size, n.node_shadow_color);
    }
    let blurred = multiply_alpha(&blur_layer(&canvas.finish(), sigma), n.node_shadow_alpha);
    blurred
        .crop(pad, pad, rect.width, rect.height)
        .ok_or_else(|| empty_canvas(rect))
}

/// Larger nodes first, so small nodes stay visible on top.
fn nodes(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let n = &ctx.settings.nodes;
    let stroke = ctx.settings.mm(n.node_stroke_width);
    let mut order: Vec<usize> = (0..ctx.nodes.len()).collect();
    order.sort_by(|&a, &b| {
        ctx.nodes[b]
            .size
            .partial_cmp(&ctx.nodes[a].size)
            .unwrap_or(Ordering::Equal)
    });
    for index in order {
        let node = &ctx.nodes[index];
        canvas.fill_circle(node.x, node.y, node.size, node.color);
        if stroke > 0.0 {
            canvas.stroke_circle(node.x, node.y, node.size, stroke, n.node_stroke_color);
        }
    }
    Ok(canvas.finish())
}

fn node_labels(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let l = &ctx.settings.labels;
    let halo_width = ctx.settings.mm(l.label_border_thickness);
    for label in &ctx.labels().labels {
        let reach = label.font_px + halo_width;
        if !label.path.samples.iter().any(|s| canvas.touches(s.x, s.y, reach)) {
            continue;
        }
        let style = TextStyle {
            family: &l.label_font_family,
            font_px: label.font_px,
            weight: label.weight,
            color: l.label_color,
            halo_width,
            halo_color: l.label_border_color,
        };
        if !draw_on_path(&mut canvas, &label.text, &label.path, &style) {
            break;
        }
    }
    Ok(canvas.finish())
}

fn cluster_labels(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let l = &ctx.settings.labels;
    let s = &ctx.settings.silhouette;
    let font_px = ctx.settings.pt(s.cluster_label_font_size);
    let weight = font_weight(ctx.settings.mm(s.cluster_label_font_thickness), font_px);
    for shape in ctx.cluster_shapes() {
        let Some(centre) = shape.barycentre else {
            continue;
        };
        let text = if shape.modality.label.trim().is_empty() {
            shape.key.as_str()
        } else {
            shape.modality.label.as_str()
        };
        let style = TextStyle {
            family: &l.label_font_family,
            font_px,
            weight,
            color: shape.modality.color,
            halo_width: ctx.settings.mm(l.label_border_thickness),
            halo_color: l.label_border_color,
        };
        draw_line(&mut canvas, text, centre, Align::Center, &style);
    }
    Ok(canvas.finish())
}

fn stats_style<'a>(ctx: &RenderContext<'a>, color: Color) -> TextStyle<'a> {
    let font_px = ctx.settings.pt(ctx.settings.stats.stats_font_size);
    TextStyle {
        family: &ctx.settings.labels.label_font_family,
        font_px,
        weight: 400,
        color,
        halo_width: 0.0,
        halo_color: Color::TRANSPARENT,
    }
}

/// Legend disc of radius `delta_max` in the bottom-left corner, with the
/// figures beside it.
fn closeness_legend(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let Some(closeness) = ctx.closeness() else {
        return Ok(canvas.finish());
    };
    let color = ctx.settings.closeness.closeness_color;
    let margin = ctx.settings.mm(ctx.settings.image.margin);
    let r = closeness.delta_max;
    let centre = (margin + r, ctx.canvas.1 as f32 - margin - r);
    canvas.fill_circle(centre.0, centre.1, r, color.with_alpha(0.12));
    canvas.stroke_circle(centre.0, centre.1, r, ctx.settings.mm(0.25), color);
    let text = format!(
        "connected closeness {:.2} within {:.1} mm, P(edge) {:.2}",
        closeness.c_max,
        closeness.delta_max / ctx.settings.mm(1.0),
        closeness.p_edge
    );
    let style = stats_style(ctx, color);
    draw_line(
        &mut canvas,
        &text,
        (centre.0 + r + style.font_px, centre.1),
        Align::Left,
        &style,
    );
    Ok(canvas.finish())
}

fn stats(ctx: &RenderContext<'_>, rect: TileRect) -> Result<RasterLayer, RenderError> {
    let mut canvas = Canvas::new(rect)?;
    let st = &ctx.settings.stats;
    let mut lines: Vec<String> = Vec::new();
    lines.extend(st.stats_title.clone());
    lines.extend(st.stats_date.clone());
    lines.push(format!("{} nodes, {} edges", ctx.nodes.len(), ctx.edges.len()));
    lines.push(match ctx.closeness() {
        Some(c) => format!(
            "connected closeness {:.2} (E% {:.2}, p% {:.2})",
            c.c_max, c.e_percent, c.p_percent
        ),
        None => "connected closeness not applicable".to_string(),
    });
    let style = stats_style(ctx, st.stats_color);
    let margin = ctx.settings.mm(ctx.settings.image.margin);
    let line_height = style.font_px * 1.3;
    for (i, line) in lines.iter().enumerate() {
        let y = margin + line_height * (i as f32 + 0.5);
        if draw_line(&mut canvas, line, (margin, y), Align::Left, &style).is_none() {
            break;
        }
    }
    Ok(canvas.finish())
}
