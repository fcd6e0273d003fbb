use crate::error::RenderError;
use crate::theme::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::path::Path;

/// Inches per millimetre, as used by the print pipeline.
pub const INCH_PER_MM: f32 = 0.0393701;

pub fn mm_to_px(mm: f32, dpi: f32) -> f32 {
    mm * dpi * INCH_PER_MM
}

pub fn pt_to_px(pt: f32, dpi: f32) -> f32 {
    pt * dpi / 72.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Millimetres.
    pub image_width: f32,
    pub image_height: f32,
    pub margin: f32,
    pub output_dpi: f32,
    pub rendering_dpi: f32,
    pub tile_factor: u32,
    /// Row-major tile index; `None` renders every tile and stitches them.
    pub tile_to_render: Option<u32>,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Degrees, counter-clockwise.
    pub rotate: f32,
    pub background_color: Color,
    pub jpeg_quality: u8,
    /// Seed for the fallback positions of nodes without coordinates.
    pub fill_seed: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            image_width: 200.0,
            image_height: 200.0,
            margin: 6.0,
            output_dpi: 300.0,
            rendering_dpi: 300.0,
            tile_factor: 1,
            tile_to_render: None,
            flip_x: false,
            flip_y: false,
            rotate: 0.0,
            background_color: Color::WHITE,
            jpeg_quality: 90,
            fill_seed: 42,
        }
    }
}

impl ImageSettings {
    /// Number of tiles in the `tile_factor x tile_factor` grid; `None` when
    /// it does not fit in a `u32`.
    pub fn tile_count(&self) -> Option<u32> {
        self.tile_factor.checked_mul(self.tile_factor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerToggles {
    pub layer_background: bool,
    pub layer_heatmap: bool,
    pub layer_hillshading: bool,
    pub layer_network_shape_fill: bool,
    pub layer_network_shape_contour: bool,
    pub layer_cluster_fills: bool,
    pub layer_cluster_contours: bool,
    pub layer_edges: bool,
    pub layer_node_shadows: bool,
    pub layer_nodes: bool,
    pub layer_node_labels: bool,
    pub layer_cluster_labels: bool,
    pub layer_connected_closeness: bool,
    pub layer_stats: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            layer_background: true,
            layer_heatmap: false,
            layer_hillshading: true,
            layer_network_shape_fill: false,
            layer_network_shape_contour: false,
            layer_cluster_fills: false,
            layer_cluster_contours: false,
            layer_edges: true,
            layer_node_shadows: false,
            layer_nodes: true,
            layer_node_labels: true,
            layer_cluster_labels: false,
            layer_connected_closeness: false,
            layer_stats: false,
        }
    }
}

impl LayerToggles {
    /// Every layer off; callers switch on what they need.
    pub fn none() -> Self {
        Self {
            layer_background: false,
            layer_heatmap: false,
            layer_hillshading: false,
            layer_network_shape_fill: false,
            layer_network_shape_contour: false,
            layer_cluster_fills: false,
            layer_cluster_contours: false,
            layer_edges: false,
            layer_node_shadows: false,
            layer_nodes: false,
            layer_node_labels: false,
            layer_cluster_labels: false,
            layer_connected_closeness: false,
            layer_stats: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapSettings {
    /// Millimetres.
    pub heatmap_spread: f32,
    pub heatmap_resolution_max: u32,
    pub heatmap_color_low: Color,
    pub heatmap_color_high: Color,
    pub heatmap_alpha: f32,
}

impl Default for HeatmapSettings {
    fn default() -> Self {
        Self {
            heatmap_spread: 10.0,
            heatmap_resolution_max: 1_000_000,
            heatmap_color_low: Color::rgba(255, 255, 255, 0),
            heatmap_color_high: Color::rgb(0xd6, 0x33, 0x2a),
            heatmap_alpha: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadingSettings {
    /// Millimetres.
    pub hillshading_spread: f32,
    pub hillshading_resolution_max: u32,
    pub hillshading_strength: f32,
    /// Radians.
    pub hillshading_sun_azimuth: f32,
    /// Radians.
    pub hillshading_sun_elevation: f32,
    pub hillshading_alpha: f32,
    pub hillshading_color: Color,
    pub hillshading_hypsometric_gradient: bool,
    pub hillshading_low_color: Color,
    pub hillshading_high_color: Color,
}

impl Default for HillshadingSettings {
    fn default() -> Self {
        Self {
            hillshading_spread: 8.0,
            hillshading_resolution_max: 1_000_000,
            hillshading_strength: 36.0,
            hillshading_sun_azimuth: 0.6 * PI,
            hillshading_sun_elevation: 0.35 * PI,
            hillshading_alpha: 0.5,
            hillshading_color: Color::rgb(0x1b, 0x24, 0x30),
            hillshading_hypsometric_gradient: false,
            hillshading_low_color: Color::rgb(0xf6, 0xf3, 0xec),
            hillshading_high_color: Color::rgb(0xd8, 0xcf, 0xbf),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiSettings {
    /// Halo range around each node body, millimetres.
    pub voronoi_range: f32,
    pub voronoi_resolution_max: u32,
}

impl Default for VoronoiSettings {
    fn default() -> Self {
        Self {
            voronoi_range: 8.0,
            voronoi_resolution_max: 4_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSettings {
    /// Millimetres.
    pub edge_thickness: f32,
    pub edge_alpha: f32,
    /// Opacity left to an edge once it leaves the halo of its endpoints.
    pub edge_fade_floor: f32,
    /// Overrides the target-node colour when set.
    pub edge_color: Option<Color>,
    /// Length of the pieces an edge is cut into for fading, millimetres.
    pub edge_segment_length: f32,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            edge_thickness: 0.05,
            edge_alpha: 0.6,
            edge_fade_floor: 0.0,
            edge_color: None,
            edge_segment_length: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub node_size_factor: f32,
    pub node_color_default: Color,
    pub node_color_from_clusters: bool,
    /// Millimetres; 0 disables the stroke.
    pub node_stroke_width: f32,
    pub node_stroke_color: Color,
    /// Millimetres.
    pub node_shadow_blur: f32,
    pub node_shadow_alpha: f32,
    pub node_shadow_color: Color,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_size_factor: 1.0,
            node_color_default: Color::rgb(0x99, 0x99, 0x99),
            node_color_from_clusters: false,
            node_stroke_width: 0.0,
            node_stroke_color: Color::WHITE,
            node_shadow_blur: 1.5,
            node_shadow_alpha: 0.6,
            node_shadow_color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    pub label_font_family: String,
    /// Points.
    pub label_font_min_size: f32,
    pub label_font_max_size: f32,
    /// Stroke thickness the font weight should visually match, millimetres.
    pub label_font_thickness: f32,
    pub label_color: Color,
    /// Millimetres; 0 disables the halo.
    pub label_border_thickness: f32,
    pub label_border_color: Color,
    pub label_count: usize,
    pub label_max_length: usize,
    pub label_curved_path: bool,
    pub label_path_center: bool,
    /// Millimetres.
    pub label_path_step: f32,
    /// Radians per step.
    pub label_max_curvature: f32,
    /// Radians either side of horizontal.
    pub label_start_angle_range: f32,
    /// Millimetres.
    pub label_margin: f32,
    pub label_node_gap: f32,
    pub label_collision_resolution_max: u32,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            label_font_family: "Public Sans, Inter, Helvetica, Arial, sans-serif".to_string(),
            label_font_min_size: 6.0,
            label_font_max_size: 18.0,
            label_font_thickness: 0.2,
            label_color: Color::rgb(0x30, 0x30, 0x40),
            label_border_thickness: 0.6,
            label_border_color: Color::WHITE,
            label_count: 400,
            label_max_length: 42,
            label_curved_path: true,
            label_path_center: false,
            label_path_step: 0.5,
            label_max_curvature: 0.06,
            label_start_angle_range: 0.6,
            label_margin: 0.4,
            label_node_gap: 0.8,
            label_collision_resolution_max: 4_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SilhouetteSettings {
    pub silhouette_resolution_max: u32,
    /// Millimetres.
    pub silhouette_blur_radius: f32,
    /// 0..1; higher values pull the contour further from the nodes.
    pub silhouette_swelling: f32,
    /// Millimetres added to every node radius before stamping.
    pub silhouette_node_margin: f32,
    pub network_shape_fill_color: Color,
    pub network_shape_contour_color: Color,
    /// Millimetres.
    pub network_shape_contour_thickness: f32,
    pub cluster_fill_alpha: f32,
    pub cluster_contour_alpha: f32,
    pub cluster_contour_thickness: f32,
    /// Points.
    pub cluster_label_font_size: f32,
    /// Millimetres.
    pub cluster_label_font_thickness: f32,
}

impl Default for SilhouetteSettings {
    fn default() -> Self {
        Self {
            silhouette_resolution_max: 1_000_000,
            silhouette_blur_radius: 6.0,
            silhouette_swelling: 0.9,
            silhouette_node_margin: 2.0,
            network_shape_fill_color: Color::rgb(0xf0, 0xec, 0xe4),
            network_shape_contour_color: Color::rgb(0xa0, 0xa0, 0xa0),
            network_shape_contour_thickness: 0.25,
            cluster_fill_alpha: 0.3,
            cluster_contour_alpha: 0.8,
            cluster_contour_thickness: 0.35,
            cluster_label_font_size: 24.0,
            cluster_label_font_thickness: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modality {
    pub color: Color,
    pub label: String,
}

/// How nodes map to clusters: the attribute holding the modality and
/// per-modality styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeClusters {
    pub attribute_id: String,
    pub modalities: BTreeMap<String, Modality>,
    #[serde(default = "default_cluster_color")]
    pub default_color: Color,
}

fn default_cluster_color() -> Color {
    Color::rgb(0xaa, 0xaa, 0xaa)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosenessSettings {
    pub closeness_seed: u64,
    pub closeness_grid_steps: usize,
    pub closeness_epsilon: f32,
    pub closeness_max_rounds: usize,
    /// Below this `C_max` the statistic is reported as not applicable.
    pub closeness_materiality: f32,
    pub closeness_color: Color,
}

impl Default for ClosenessSettings {
    fn default() -> Self {
        Self {
            closeness_seed: 1,
            closeness_grid_steps: 64,
            closeness_epsilon: 1e-3,
            closeness_max_rounds: 20,
            closeness_materiality: 0.1,
            closeness_color: Color::rgb(0x30, 0x30, 0x40),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    pub stats_title: Option<String>,
    pub stats_date: Option<String>,
    /// Points.
    pub stats_font_size: f32,
    pub stats_color: Color,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            stats_title: None,
            stats_date: None,
            stats_font_size: 9.0,
            stats_color: Color::rgb(0x30, 0x30, 0x40),
        }
    }
}

/// The render settings record. Groups are flattened so a settings file is a
/// single flat object of `snake_case` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub image: ImageSettings,
    #[serde(flatten)]
    pub layers: LayerToggles,
    #[serde(flatten)]
    pub heatmap: HeatmapSettings,
    #[serde(flatten)]
    pub hillshading: HillshadingSettings,
    #[serde(flatten)]
    pub voronoi: VoronoiSettings,
    #[serde(flatten)]
    pub edges: EdgeSettings,
    #[serde(flatten)]
    pub nodes: NodeSettings,
    #[serde(flatten)]
    pub labels: LabelSettings,
    #[serde(flatten)]
    pub silhouette: SilhouetteSettings,
    #[serde(flatten)]
    pub closeness: ClosenessSettings,
    #[serde(flatten)]
    pub stats: StatsSettings,
    pub node_clusters: Option<NodeClusters>,
}

impl Settings {
    /// Millimetres to rendering pixels.
    pub fn mm(&self, mm: f32) -> f32 {
        mm_to_px(mm, self.image.rendering_dpi)
    }

    /// Points to rendering pixels.
    pub fn pt(&self, pt: f32) -> f32 {
        pt_to_px(pt, self.image.rendering_dpi)
    }

    /// Full (untiled) canvas size in rendering pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        let w = self.mm(self.image.image_width).floor().max(1.0) as u32;
        let h = self.mm(self.image.image_height).floor().max(1.0) as u32;
        (w, h)
    }

    /// Final image size after resampling to the output DPI.
    pub fn output_size(&self) -> (u32, u32) {
        let w = mm_to_px(self.image.image_width, self.image.output_dpi).floor().max(1.0) as u32;
        let h = mm_to_px(self.image.image_height, self.image.output_dpi).floor().max(1.0) as u32;
        (w, h)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let image = &self.image;
        if !(image.rendering_dpi > 0.0) || !(image.output_dpi > 0.0) {
            return Err(RenderError::InvalidSettings(
                "rendering_dpi and output_dpi must be positive".to_string(),
            ));
        }
        if !(image.image_width > 0.0) || !(image.image_height > 0.0) {
            return Err(RenderError::InvalidSettings(
                "image_width and image_height must be positive".to_string(),
            ));
        }
        if image.tile_factor == 0 {
            return Err(RenderError::InvalidSettings(
                "tile_factor must be at least 1".to_string(),
            ));
        }
        let Some(tiles) = image.tile_count() else {
            return Err(RenderError::InvalidSettings(format!(
                "tile_factor {} gives more tiles than can be numbered",
                image.tile_factor
            )));
        };
        if let Some(tile) = image.tile_to_render
            && tile >= tiles
        {
            return Err(RenderError::InvalidSettings(format!(
                "tile_to_render {tile} is out of range for tile_factor {}",
                image.tile_factor
            )));
        }
        if self.node_clusters.is_none() {
            let layers = &self.layers;
            let cluster_layers = [
                (layers.layer_cluster_fills, "cluster_fills"),
                (layers.layer_cluster_contours, "cluster_contours"),
                (layers.layer_cluster_labels, "cluster_labels"),
                (self.nodes.node_color_from_clusters, "node_color_from_clusters"),
            ];
            if let Some((_, layer)) = cluster_layers.iter().find(|(enabled, _)| *enabled) {
                return Err(RenderError::MissingClusterDescriptor { layer });
            }
        }
        Ok(())
    }
}

/// Loads settings from a JSON (or JSON5) file layered over the defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, RenderError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| RenderError::SettingsRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&contents).map_err(|message| RenderError::SettingsParse {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse_settings(contents: &str) -> Result<Settings, String> {
    match serde_json::from_str::<Settings>(contents) {
        Ok(settings) => Ok(settings),
        Err(json_err) => json5::from_str::<Settings>(contents)
            .map_err(|json5_err| format!("{json_err} (as JSON5: {json5_err})")),
    }
}
