//! The layer pipeline: rescale, per-pass caches, tiled composition, output.

pub mod context;
pub mod layers;
pub mod text;

pub use context::{ClusterShape, RenderContext};
pub use layers::Layer;

use crate::config::Settings;
use crate::diagnostics::RenderReport;
use crate::error::RenderError;
use crate::field::density_field;
use crate::ir::{FillReport, Graph, MapGraph};
use crate::raster::{
    OutputFormat, RasterLayer, TileRect, overlay, resample, stitch, tile_rect, write_layer,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A rendered image together with what happened while producing it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub image: RasterLayer,
    pub report: RenderReport,
}

/// Owns a working copy of the graph and renders it with one settings record.
#[derive(Debug, Clone)]
pub struct Renderer {
    settings: Settings,
    graph: MapGraph,
    fill: FillReport,
    initialized: bool,
}

impl Renderer {
    /// Validates `settings` and copies `graph`, filling in missing data.
    pub fn new(graph: &Graph, settings: Settings) -> Result<Self, RenderError> {
        settings.validate()?;
        let (mut graph, fill) =
            MapGraph::fill_missing_data(graph, settings.nodes.node_color_default, settings.image.fill_seed);
        if settings.nodes.node_color_from_clusters
            && let Some(clusters) = &settings.node_clusters
        {
            for node in &mut graph.nodes {
                node.color = node
                    .attributes
                    .get(&clusters.attribute_id)
                    .and_then(|value| clusters.modalities.get(&value.as_key()))
                    .map(|modality| modality.color)
                    .unwrap_or(clusters.default_color);
            }
        }
        Ok(Self {
            settings,
            graph,
            fill,
            initialized: false,
        })
    }

    pub fn graph(&self) -> &MapGraph {
        &self.graph
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fill_report(&self) -> FillReport {
        self.fill
    }

    /// Moves the graph into canvas pixels: rotate, flip, then fit the node
    /// discs inside the margins, centred. Runs once; later calls do nothing.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        let image = &self.settings.image;
        let nodes = &mut self.graph.nodes;
        if nodes.is_empty() {
            return;
        }

        let (sin, cos) = image.rotate.to_radians().sin_cos();
        for node in nodes.iter_mut() {
            let (x, y) = (node.x, node.y);
            node.x = x * cos - y * sin;
            node.y = x * sin + y * cos;
            if image.flip_x {
                node.x = -node.x;
            }
            if image.flip_y {
                node.y = -node.y;
            }
        }

        let (mut x0, mut y0, mut x1, mut y1) = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for node in nodes.iter() {
            x0 = x0.min(node.x - node.size);
            y0 = y0.min(node.y - node.size);
            x1 = x1.max(node.x + node.size);
            y1 = y1.max(node.y + node.size);
        }
        let (width, height) = self.settings.canvas_size();
        let margin = self.settings.mm(image.margin);
        let fit = |available: f32, extent: f32| (extent > 0.0).then(|| available / extent);
        let ratio = match (
            fit(width as f32 - 2.0 * margin, x1 - x0),
            fit(height as f32 - 2.0 * margin, y1 - y0),
        ) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => 1.0,
        };
        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let size_factor = self.settings.nodes.node_size_factor;
        for node in nodes.iter_mut() {
            node.x = width as f32 / 2.0 + (node.x - cx) * ratio;
            node.y = height as f32 / 2.0 + (node.y - cy) * ratio;
            node.size *= ratio * size_factor;
        }
        log::debug!("rescaled {} nodes by {ratio:.4}", nodes.len());
    }

    /// Renders every tile (or only `tile_to_render`), stitches and
    /// resamples to the output resolution.
    pub fn render(&mut self) -> Result<RenderOutput, RenderError> {
        self.init();
        let started = Instant::now();
        let settings = &self.settings;
        let canvas = settings.canvas_size();
        let factor = settings.image.tile_factor.max(1);
        let count = settings
            .image
            .tile_count()
            .ok_or_else(|| RenderError::InvalidSettings(format!("tile_factor {factor} is too large")))?;
        let indices: Vec<u32> = match settings.image.tile_to_render {
            Some(index) => vec![index],
            None => (0..count).collect(),
        };
        log::info!(
            "rendering {} nodes, {} edges on a {}x{} canvas, {} of {} tile(s)",
            self.graph.nodes.len(),
            self.graph.edges.len(),
            canvas.0,
            canvas.1,
            indices.len(),
            count
        );

        let ctx = RenderContext::new(&self.graph.nodes, &self.graph.edges, settings);
        let prepared = Instant::now();
        ctx.prepare();
        log::debug!(
            "shared fields and labels built in {:.1} ms",
            prepared.elapsed().as_secs_f64() * 1000.0
        );
        let tiles = indices
            .par_iter()
            .map(|&index| render_tile(&ctx, tile_rect(canvas, factor, index)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = RenderReport {
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            tiles: indices.clone(),
            nodes: self.graph.nodes.len(),
            edges: self.graph.edges.len(),
            fill: self.fill,
            ..Default::default()
        };
        let mut rendered = Vec::with_capacity(tiles.len());
        for (tile, timings) in tiles {
            for (name, millis) in timings {
                report.record_layer(name, millis);
            }
            rendered.push(tile);
        }

        let image = match settings.image.tile_to_render {
            Some(_) => rendered.pop().ok_or(RenderError::EmptyCanvas {
                width: canvas.0,
                height: canvas.1,
            })?,
            None => stitch(canvas, factor, &rendered)?,
        };
        let (out_w, out_h) = match settings.image.tile_to_render {
            Some(_) => {
                let scale = settings.image.output_dpi / settings.image.rendering_dpi;
                (
                    ((image.width() as f32 * scale).round() as u32).max(1),
                    ((image.height() as f32 * scale).round() as u32).max(1),
                )
            }
            None => settings.output_size(),
        };
        let image = resample(&image, out_w, out_h)?;

        report.output_width = out_w;
        report.output_height = out_h;
        report.fields = ctx.field_dumps();
        report.labels = ctx.label_dump().unwrap_or_default();
        report.closeness = ctx.computed_closeness();
        log::info!(
            "rendered {}x{} in {:.1} ms",
            out_w,
            out_h,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(RenderOutput { image, report })
    }

    /// Renders and writes the image; the format comes from the extension
    /// unless given.
    pub fn render_to_file(&mut self, path: &Path, format: Option<OutputFormat>) -> Result<RenderReport, RenderError> {
        let format = match format {
            Some(format) => format,
            None => OutputFormat::from_path(path)?,
        };
        let output = self.render()?;
        let image = &self.settings.image;
        write_layer(&output.image, path, format, image.background_color, image.jpeg_quality)?;
        log::info!("wrote {}", path.display());
        Ok(output.report)
    }

    /// Writes one heatmap per cluster modality into `dir`, each built from
    /// that modality's nodes only, and returns the paths written.
    pub fn render_cluster_heatmaps(&mut self, dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
        self.init();
        let settings = &self.settings;
        let clusters = settings
            .node_clusters
            .as_ref()
            .ok_or(RenderError::MissingClusterDescriptor {
                layer: "cluster_heatmaps",
            })?;
        let canvas = settings.canvas_size();
        let full = TileRect {
            x: 0,
            y: 0,
            width: canvas.0,
            height: canvas.1,
        };
        let (out_w, out_h) = settings.output_size();
        let h = &settings.heatmap;
        let backdrop = RasterLayer::filled(canvas.0, canvas.1, settings.image.background_color).ok_or(
            RenderError::EmptyCanvas {
                width: canvas.0,
                height: canvas.1,
            },
        )?;

        let mut written = Vec::with_capacity(clusters.modalities.len());
        for key in clusters.modalities.keys() {
            let weights: Vec<f32> = self
                .graph
                .nodes
                .iter()
                .map(|node| {
                    let member = node
                        .attributes
                        .get(&clusters.attribute_id)
                        .is_some_and(|value| value.as_key() == *key);
                    if member { 1.0 } else { 0.0 }
                })
                .collect();
            let density = density_field(
                &self.graph.nodes,
                Some(&weights),
                settings.mm(h.heatmap_spread),
                canvas,
                h.heatmap_resolution_max,
            );
            let heat = layers::heatmap_layer(&density, h, full)?;
            let image = resample(&overlay(&backdrop, &heat, Layer::Heatmap.blend()), out_w, out_h)?;
            let path = dir.join(format!("heatmap_{}.png", file_stem(key)));
            write_layer(
                &image,
                &path,
                OutputFormat::Png,
                settings.image.background_color,
                settings.image.jpeg_quality,
            )?;
            log::info!("wrote cluster heatmap {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Layer timings of one tile, in milliseconds.
pub type TileTimings = Vec<(&'static str, f64)>;

/// Composes the enabled layers of one tile bottom to top. `ctx` should have
/// been through [`RenderContext::prepare`] when tiles run in parallel.
pub fn render_tile(ctx: &RenderContext<'_>, rect: TileRect) -> Result<(RasterLayer, TileTimings), RenderError> {
    let mut image = RasterLayer::new(rect.width, rect.height).ok_or(RenderError::EmptyCanvas {
        width: rect.width,
        height: rect.height,
    })?;
    let mut timings = Vec::new();
    for layer in Layer::ORDER {
        if !layer.enabled(&ctx.settings.layers) {
            continue;
        }
        let started = Instant::now();
        let top = layer.draw(ctx, rect)?;
        image = overlay(&image, &top, layer.blend());
        let millis = started.elapsed().as_secs_f64() * 1000.0;
        log::debug!("tile ({}, {}): {} in {millis:.1} ms", rect.x, rect.y, layer.name());
        timings.push((layer.name(), millis));
    }
    Ok((image, timings))
}

/// Modality keys as file-name fragments.
fn file_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "empty".to_string() } else { stem }
}
