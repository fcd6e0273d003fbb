use crate::theme::{Color, parse_color};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Index of a node inside a [`MapGraph`].
pub type NodeIndex = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            AttrValue::Text(v) => v.trim().parse::<f64>().ok(),
        }
    }

    /// Text used to match the value against cluster modality keys.
    pub fn as_key(&self) -> String {
        match self {
            AttrValue::Number(v) if v.fract() == 0.0 => format!("{}", *v as i64),
            AttrValue::Number(v) => format!("{v}"),
            AttrValue::Bool(v) => v.to_string(),
            AttrValue::Text(v) => v.clone(),
        }
    }
}

/// A node as handed over by the layout step. Any field may be missing.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub size: Option<f32>,
    pub color: Option<String>,
    pub label: Option<String>,
    pub important: bool,
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str, x: f32, y: f32, size: f32) -> &mut Node {
        self.nodes.push(Node {
            id: id.to_string(),
            x: Some(x),
            y: Some(y),
            size: Some(size),
            ..Default::default()
        });
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    pub fn add_edge(&mut self, source: &str, target: &str) {
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            opacity: None,
        });
    }
}

/// A node after the fill-missing-data pass: every numeric field is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct MapNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Color,
    pub label: String,
    pub important: bool,
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub opacity: f32,
}

/// Counts of the input defects recovered while filling missing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub positions: usize,
    pub sizes: usize,
    pub colors: usize,
    pub labels: usize,
    pub dangling_edges: usize,
}

/// The renderer's owned working copy of the graph.
#[derive(Debug, Clone, Default)]
pub struct MapGraph {
    pub nodes: Vec<MapNode>,
    pub edges: Vec<MapEdge>,
    pub index: HashMap<String, NodeIndex>,
}

impl MapGraph {
    /// Copies `graph`, replacing missing or non-finite fields with fallbacks.
    /// Never fails: positions fall back to seeded random points inside the
    /// bounding box of the valid nodes, sizes to 1, colours to
    /// `default_color`, labels to the empty string.
    pub fn fill_missing_data(graph: &Graph, default_color: Color, seed: u64) -> (Self, FillReport) {
        let mut report = FillReport::default();
        let mut rng = StdRng::seed_from_u64(seed);

        let valid = |v: Option<f32>| v.filter(|v| v.is_finite());
        let mut bounds: Option<(f32, f32, f32, f32)> = None;
        for node in &graph.nodes {
            if let (Some(x), Some(y)) = (valid(node.x), valid(node.y)) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        let (bx0, by0, bx1, by1) = match bounds {
            Some((x0, y0, x1, y1)) if x1 > x0 && y1 > y0 => (x0, y0, x1, y1),
            Some((x0, y0, _, _)) => (x0 - 500.0, y0 - 500.0, x0 + 500.0, y0 + 500.0),
            None => (0.0, 0.0, 1000.0, 1000.0),
        };

        // far from the origin the +-500 padding can vanish in f32
        let within = |rng: &mut StdRng, lo: f32, hi: f32| if lo < hi { rng.gen_range(lo..hi) } else { lo };

        let mut nodes = Vec::with_capacity(graph.nodes.len());
        let mut index = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let (x, y) = match (valid(node.x), valid(node.y)) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    report.positions += 1;
                    log::debug!("node {:?}: missing position, using a random fallback", node.id);
                    (within(&mut rng, bx0, bx1), within(&mut rng, by0, by1))
                }
            };
            let size = match valid(node.size).filter(|s| *s > 0.0) {
                Some(size) => size,
                None => {
                    report.sizes += 1;
                    log::debug!("node {:?}: missing size, using 1", node.id);
                    1.0
                }
            };
            let color = match node.color.as_deref().and_then(parse_color) {
                Some(color) => color,
                None => {
                    report.colors += 1;
                    log::debug!("node {:?}: missing or invalid color", node.id);
                    default_color
                }
            };
            let label = match &node.label {
                Some(label) => label.clone(),
                None => {
                    report.labels += 1;
                    String::new()
                }
            };
            index.insert(node.id.clone(), nodes.len() as NodeIndex);
            nodes.push(MapNode {
                id: node.id.clone(),
                x,
                y,
                size,
                color,
                label,
                important: node.important,
                attributes: node.attributes.clone(),
            });
        }

        let mut edges = Vec::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            match (index.get(&edge.source), index.get(&edge.target)) {
                (Some(&source), Some(&target)) => edges.push(MapEdge {
                    source,
                    target,
                    opacity: edge.opacity.filter(|o| o.is_finite()).unwrap_or(1.0).clamp(0.0, 1.0),
                }),
                _ => {
                    report.dangling_edges += 1;
                    log::warn!(
                        "dropping edge {:?} -> {:?}: unknown endpoint",
                        edge.source,
                        edge.target
                    );
                }
            }
        }

        (Self { nodes, edges, index }, report)
    }

    pub fn node(&self, id: &str) -> Option<&MapNode> {
        self.index.get(id).map(|&i| &self.nodes[i as usize])
    }

    /// Value of `attribute` on `node` as a cluster modality key.
    pub fn modality_of(&self, node: &MapNode, attribute: &str) -> Option<String> {
        node.attributes.get(attribute).map(AttrValue::as_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_missing_field() {
        let mut graph = Graph::new();
        graph.add_node("a", 0.0, 0.0, 4.0);
        graph.add_node("b", 100.0, 50.0, 2.0);
        graph.nodes.push(Node {
            id: "c".to_string(),
            x: None,
            y: Some(f32::NAN),
            size: Some(-3.0),
            color: Some("not a color".to_string()),
            ..Default::default()
        });
        graph.add_edge("a", "c");
        graph.add_edge("a", "missing");

        let default = Color::rgb(1, 2, 3);
        let (map, report) = MapGraph::fill_missing_data(&graph, default, 7);
        let c = map.node("c").unwrap();
        assert!(c.x.is_finite() && c.y.is_finite());
        assert!((0.0..=100.0).contains(&c.x));
        assert!((0.0..=50.0).contains(&c.y));
        assert_eq!(c.size, 1.0);
        assert_eq!(c.color, default);
        assert_eq!(c.label, "");
        assert_eq!(map.edges.len(), 1);
        assert_eq!(
            report,
            FillReport {
                positions: 1,
                sizes: 1,
                colors: 3,
                labels: 3,
                dangling_edges: 1
            }
        );
    }

    #[test]
    fn fallback_positions_are_seeded() {
        let mut graph = Graph::new();
        graph.nodes.push(Node {
            id: "lost".to_string(),
            ..Default::default()
        });
        let (a, _) = MapGraph::fill_missing_data(&graph, Color::BLACK, 3);
        let (b, _) = MapGraph::fill_missing_data(&graph, Color::BLACK, 3);
        assert_eq!(a.nodes[0].x, b.nodes[0].x);
        assert_eq!(a.nodes[0].y, b.nodes[0].y);
    }

    #[test]
    fn fallback_positions_survive_huge_coordinates() {
        let mut graph = Graph::new();
        graph.add_node("far", 1e12, 1e12, 2.0);
        graph.nodes.push(Node {
            id: "lost".to_string(),
            ..Default::default()
        });
        let (filled, report) = MapGraph::fill_missing_data(&graph, Color::BLACK, 7);
        assert_eq!(report.positions, 1);
        assert_eq!((filled.nodes[1].x, filled.nodes[1].y), (1e12, 1e12));
    }

    #[test]
    fn attribute_keys_normalise_integers() {
        assert_eq!(AttrValue::Number(3.0).as_key(), "3");
        assert_eq!(AttrValue::Text("left".into()).as_key(), "left");
        assert_eq!(AttrValue::Text("2.5".into()).as_f64(), Some(2.5));
    }
}
