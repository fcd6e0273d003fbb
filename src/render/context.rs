//! Per-pass caches shared by every tile of one render pass.

use super::layers::Layer;
use crate::closeness::{Closeness, ClosenessParams, connected_closeness};
use crate::config::{Modality, Settings};
use crate::diagnostics::{FieldDump, LabelDump};
use crate::field::hillshading::HillshadingParams;
use crate::field::silhouette::SilhouetteParams;
use crate::field::{
    DensityField, HillshadingData, Silhouette, VoronoiField, density_field, hillshading, silhouette,
    voronoi_field,
};
use crate::ir::{MapEdge, MapNode};
use crate::labels::{LabelParams, Placement, place_labels};
use std::sync::OnceLock;

/// Outline of the nodes of one cluster modality.
#[derive(Debug, Clone)]
pub struct ClusterShape {
    pub key: String,
    pub modality: Modality,
    pub silhouette: Silhouette,
    /// Size-weighted centre of the modality's nodes, `None` when it has none.
    pub barycentre: Option<(f32, f32)>,
}

/// Everything a layer may need that depends on the whole canvas. Each
/// entry is built on first use and then shared; tiles only read.
pub struct RenderContext<'a> {
    pub nodes: &'a [MapNode],
    pub edges: &'a [MapEdge],
    pub settings: &'a Settings,
    pub canvas: (u32, u32),
    heatmap_density: OnceLock<DensityField>,
    terrain_density: OnceLock<DensityField>,
    hillshading: OnceLock<HillshadingData>,
    voronoi: OnceLock<VoronoiField>,
    labels: OnceLock<Placement>,
    network_silhouette: OnceLock<Silhouette>,
    cluster_shapes: OnceLock<Vec<ClusterShape>>,
    closeness: OnceLock<Option<Closeness>>,
}

impl<'a> RenderContext<'a> {
    pub fn new(nodes: &'a [MapNode], edges: &'a [MapEdge], settings: &'a Settings) -> Self {
        Self {
            nodes,
            edges,
            settings,
            canvas: settings.canvas_size(),
            heatmap_density: OnceLock::new(),
            terrain_density: OnceLock::new(),
            hillshading: OnceLock::new(),
            voronoi: OnceLock::new(),
            labels: OnceLock::new(),
            network_silhouette: OnceLock::new(),
            cluster_shapes: OnceLock::new(),
            closeness: OnceLock::new(),
        }
    }

    /// Builds, one after another, every entry the enabled layers read.
    ///
    /// Must run before tiles are rendered in parallel: the builders use
    /// rayon themselves, and a tile job stolen by a worker that is still
    /// inside `get_or_init` would block on the same cell forever.
    pub fn prepare(&self) {
        for layer in Layer::ORDER {
            if layer.enabled(&self.settings.layers) {
                layer.prepare(self);
            }
        }
    }

    pub fn heatmap_density(&self) -> &DensityField {
        self.heatmap_density.get_or_init(|| {
            let h = &self.settings.heatmap;
            density_field(
                self.nodes,
                None,
                self.settings.mm(h.heatmap_spread),
                self.canvas,
                h.heatmap_resolution_max,
            )
        })
    }

    /// Density used as terrain elevation; also steers the labels.
    pub fn terrain_density(&self) -> &DensityField {
        self.terrain_density.get_or_init(|| {
            let h = &self.settings.hillshading;
            density_field(
                self.nodes,
                None,
                self.settings.mm(h.hillshading_spread),
                self.canvas,
                h.hillshading_resolution_max,
            )
        })
    }

    pub fn hillshading(&self) -> &HillshadingData {
        self.hillshading.get_or_init(|| {
            let h = &self.settings.hillshading;
            hillshading(
                self.terrain_density(),
                HillshadingParams {
                    strength: h.hillshading_strength,
                    sun_azimuth: h.hillshading_sun_azimuth,
                    sun_elevation: h.hillshading_sun_elevation,
                },
            )
        })
    }

    pub fn voronoi(&self) -> &VoronoiField {
        self.voronoi.get_or_init(|| {
            let v = &self.settings.voronoi;
            voronoi_field(
                self.nodes,
                self.settings.mm(v.voronoi_range),
                self.canvas,
                v.voronoi_resolution_max,
            )
        })
    }

    pub fn labels(&self) -> &Placement {
        self.labels.get_or_init(|| {
            let params = LabelParams::from_settings(self.settings);
            let shading = self.hillshading();
            let downhill = |x: f32, y: f32| shading.downhill_angle(x, y);
            place_labels(self.nodes, self.canvas, &params, &downhill)
        })
    }

    pub fn network_silhouette(&self) -> &Silhouette {
        self.network_silhouette
            .get_or_init(|| silhouette(self.nodes, |_, _| true, self.canvas, self.silhouette_params()))
    }

    /// One shape per modality of the cluster descriptor, in key order.
    /// Empty without a descriptor.
    pub fn cluster_shapes(&self) -> &[ClusterShape] {
        self.cluster_shapes.get_or_init(|| {
            let Some(clusters) = &self.settings.node_clusters else {
                return Vec::new();
            };
            let params = self.silhouette_params();
            clusters
                .modalities
                .iter()
                .map(|(key, modality)| {
                    let member = |node: &MapNode| {
                        node.attributes
                            .get(&clusters.attribute_id)
                            .is_some_and(|value| value.as_key() == *key)
                    };
                    let silhouette = silhouette(self.nodes, |_, node| member(node), self.canvas, params);
                    let (mut sx, mut sy, mut total) = (0.0f32, 0.0f32, 0.0f32);
                    for node in self.nodes.iter().filter(|&n| member(n)) {
                        sx += node.x * node.size;
                        sy += node.y * node.size;
                        total += node.size;
                    }
                    let barycentre = (total > 0.0).then(|| (sx / total, sy / total));
                    if barycentre.is_none() {
                        log::debug!("cluster modality {key:?} has no nodes");
                    }
                    ClusterShape {
                        key: key.clone(),
                        modality: modality.clone(),
                        silhouette,
                        barycentre,
                    }
                })
                .collect()
        })
    }

    pub fn closeness(&self) -> Option<&Closeness> {
        self.closeness
            .get_or_init(|| {
                connected_closeness(self.nodes, self.edges, &ClosenessParams::from_settings(self.settings))
            })
            .as_ref()
    }

    fn silhouette_params(&self) -> SilhouetteParams {
        let s = &self.settings.silhouette;
        SilhouetteParams {
            max_pixels: s.silhouette_resolution_max,
            blur_radius: self.settings.mm(s.silhouette_blur_radius),
            node_margin: self.settings.mm(s.silhouette_node_margin),
            swelling: s.silhouette_swelling,
        }
    }

    /// Sizes of the fields built so far.
    pub fn field_dumps(&self) -> Vec<FieldDump> {
        let mut dumps = Vec::new();
        let mut push = |name: &'static str, width: usize, height: usize, ratio: f32| {
            dumps.push(FieldDump {
                name,
                width,
                height,
                ratio,
            })
        };
        if let Some(d) = self.heatmap_density.get() {
            push("heatmap_density", d.field.width, d.field.height, d.field.ratio);
        }
        if let Some(d) = self.terrain_density.get() {
            push("terrain_density", d.field.width, d.field.height, d.field.ratio);
        }
        if let Some(h) = self.hillshading.get() {
            let r = &h.reflectance;
            push("hillshading", r.width, r.height, r.ratio);
        }
        if let Some(v) = self.voronoi.get() {
            push("voronoi", v.ids.width, v.ids.height, v.ids.ratio);
        }
        if let Some(s) = self.network_silhouette.get() {
            push("network_silhouette", s.width, s.height, s.ratio);
        }
        // modalities share one grid size
        if let Some(s) = self.cluster_shapes.get().and_then(|shapes| shapes.first()) {
            push("cluster_silhouettes", s.silhouette.width, s.silhouette.height, s.silhouette.ratio);
        }
        dumps
    }

    /// Label counts, if labels were placed during the pass.
    pub fn label_dump(&self) -> Option<LabelDump> {
        self.labels.get().map(|placement| {
            let important = placement
                .labels
                .iter()
                .filter(|l| self.nodes[l.node as usize].important)
                .count();
            LabelDump::from_placement(placement, important)
        })
    }

    /// Closeness, if it was computed during the pass.
    pub fn computed_closeness(&self) -> Option<Closeness> {
        self.closeness.get().cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeClusters;
    use crate::ir::AttrValue;
    use crate::theme::Color;
    use std::collections::BTreeMap;

    fn node(x: f32, y: f32, size: f32, group: &str) -> MapNode {
        let mut attributes = BTreeMap::new();
        attributes.insert("group".to_string(), AttrValue::Text(group.to_string()));
        MapNode {
            id: format!("{x}-{y}"),
            x,
            y,
            size,
            color: Color::BLACK,
            label: String::new(),
            important: false,
            attributes,
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.image.image_width = 100.0;
        settings.image.image_height = 100.0;
        settings.image.rendering_dpi = 72.0;
        let mut modalities = BTreeMap::new();
        for (key, color) in [("a", Color::rgb(255, 0, 0)), ("b", Color::rgb(0, 0, 255)), ("z", Color::BLACK)] {
            modalities.insert(
                key.to_string(),
                Modality {
                    color,
                    label: key.to_uppercase(),
                },
            );
        }
        settings.node_clusters = Some(NodeClusters {
            attribute_id: "group".to_string(),
            modalities,
            default_color: Color::WHITE,
        });
        settings
    }

    #[test]
    fn fields_are_built_once_and_reported() {
        let nodes = vec![node(50.0, 50.0, 5.0, "a")];
        let settings = settings();
        let ctx = RenderContext::new(&nodes, &[], &settings);
        assert!(ctx.field_dumps().is_empty());
        let first = ctx.terrain_density() as *const DensityField;
        ctx.hillshading();
        assert_eq!(first, ctx.terrain_density() as *const DensityField);
        let names: Vec<&str> = ctx.field_dumps().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["terrain_density", "hillshading"]);
        assert!(ctx.label_dump().is_none());
    }

    #[test]
    fn prepare_builds_what_enabled_layers_read() {
        let mut nodes = vec![node(30.0, 30.0, 4.0, "a"), node(120.0, 90.0, 6.0, "b")];
        nodes[0].label = "first".to_string();
        let edges = vec![MapEdge {
            source: 0,
            target: 1,
            opacity: 1.0,
        }];
        let mut settings = settings();
        settings.layers = crate::config::LayerToggles {
            layer_hillshading: true,
            layer_edges: true,
            layer_node_labels: true,
            layer_cluster_labels: true,
            ..crate::config::LayerToggles::none()
        };
        let ctx = RenderContext::new(&nodes, &edges, &settings);
        ctx.prepare();
        let names: Vec<&str> = ctx.field_dumps().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec!["terrain_density", "hillshading", "voronoi", "cluster_silhouettes"]
        );
        assert!(ctx.label_dump().is_some());
        assert!(ctx.computed_closeness().is_none());

        // nothing enabled: nothing built
        settings.layers = crate::config::LayerToggles::none();
        let ctx = RenderContext::new(&nodes, &edges, &settings);
        ctx.prepare();
        assert!(ctx.field_dumps().is_empty());
        assert!(ctx.label_dump().is_none());
    }

    #[test]
    fn cluster_barycentres_are_size_weighted() {
        let nodes = vec![
            node(40.0, 100.0, 1.0, "a"),
            node(100.0, 100.0, 3.0, "a"),
            node(200.0, 200.0, 4.0, "b"),
        ];
        let settings = settings();
        let ctx = RenderContext::new(&nodes, &[], &settings);
        let shapes = ctx.cluster_shapes();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].key, "a");
        let (x, y) = shapes[0].barycentre.unwrap();
        assert!((x - 85.0).abs() < 1e-4);
        assert!((y - 100.0).abs() < 1e-4);
        assert!(!shapes[0].silhouette.is_empty());
        assert_eq!(shapes[1].barycentre, Some((200.0, 200.0)));
        assert!(shapes[2].barycentre.is_none());
        assert!(shapes[2].silhouette.is_empty());
    }
}
