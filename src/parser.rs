//! Reader for the graph interchange file produced by the layout step.
//!
//! ```text
//! { "nodes": [ { "id": "...", "x": 1.0, "y": 2.0, "size": 3.0, "color": "#...",
//!                "label": "...", "important": false, "<attribute>": ... } ],
//!   "edges": [ { "source": "...", "target": "...", "opacity": 0.5 } ] }
//! ```
//!
//! Field values are read leniently: numbers may be strings, unknown keys become
//! node attributes, anything unreadable is left missing for the fill pass.

use crate::error::RenderError;
use crate::ir::{AttrValue, Edge, Graph, Node};
use serde_json::Value;
use std::path::Path;

const NODE_KEYS: [&str; 7] = ["id", "x", "y", "size", "color", "label", "important"];

pub fn read_graph(path: &Path) -> Result<Graph, RenderError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RenderError::GraphRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|source| RenderError::GraphParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(graph_from_value(&value))
}

pub fn parse_graph(input: &str) -> Result<Graph, serde_json::Error> {
    let value: Value = serde_json::from_str(input)?;
    Ok(graph_from_value(&value))
}

pub fn graph_from_value(value: &Value) -> Graph {
    let mut graph = Graph::new();
    if let Some(nodes) = value.get("nodes").and_then(Value::as_array) {
        for (idx, raw) in nodes.iter().enumerate() {
            graph.nodes.push(node_from_value(raw, idx));
        }
    }
    if let Some(edges) = value.get("edges").and_then(Value::as_array) {
        for raw in edges {
            let (Some(source), Some(target)) = (
                raw.get("source").and_then(as_id),
                raw.get("target").and_then(as_id),
            ) else {
                log::warn!("skipping edge without source/target: {raw}");
                continue;
            };
            graph.edges.push(Edge {
                source,
                target,
                opacity: raw.get("opacity").and_then(as_f32),
            });
        }
    }
    graph
}

fn node_from_value(raw: &Value, idx: usize) -> Node {
    let id = raw
        .get("id")
        .and_then(as_id)
        .unwrap_or_else(|| format!("#{idx}"));
    let mut attributes = std::collections::BTreeMap::new();
    if let Some(object) = raw.as_object() {
        for (key, value) in object {
            if NODE_KEYS.contains(&key.as_str()) {
                continue;
            }
            let attr = match value {
                Value::Number(n) => n.as_f64().map(AttrValue::Number),
                Value::Bool(b) => Some(AttrValue::Bool(*b)),
                Value::String(s) => Some(AttrValue::Text(s.clone())),
                _ => None,
            };
            if let Some(attr) = attr {
                attributes.insert(key.clone(), attr);
            }
        }
    }
    Node {
        id,
        x: raw.get("x").and_then(as_f32),
        y: raw.get("y").and_then(as_f32),
        size: raw.get("size").and_then(as_f32),
        color: raw.get("color").and_then(Value::as_str).map(str::to_string),
        label: raw.get("label").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }),
        important: raw
            .get("important")
            .map(|v| match v {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                Value::String(s) => matches!(s.trim(), "true" | "1" | "yes"),
                _ => false,
            })
            .unwrap_or(false),
        attributes,
    }
}

fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_f32(value: &Value) -> Option<f32> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let v = v as f32;
    v.is_finite().then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nodes_edges_and_attributes() {
        let graph = parse_graph(
            r##"{
              "nodes": [
                {"id": "a", "x": 1, "y": "2.5", "size": 3, "color": "#ff0000",
                 "label": "@alice", "important": true, "party": "left", "followers": 12},
                {"id": 7, "x": null, "label": 42}
              ],
              "edges": [{"source": "a", "target": 7, "opacity": 0.5}, {"source": "a"}]
            }"##,
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        let a = &graph.nodes[0];
        assert_eq!(a.y, Some(2.5));
        assert!(a.important);
        assert_eq!(a.attributes.get("party"), Some(&AttrValue::Text("left".into())));
        assert_eq!(a.attributes.get("followers"), Some(&AttrValue::Number(12.0)));
        assert!(!a.attributes.contains_key("label"));
        let b = &graph.nodes[1];
        assert_eq!(b.id, "7");
        assert_eq!(b.x, None);
        assert_eq!(b.label.as_deref(), Some("42"));
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, "7");
        assert_eq!(graph.edges[0].opacity, Some(0.5));
    }

    #[test]
    fn graph_without_edges_is_fine() {
        let graph = parse_graph(r#"{"nodes": [{"id": "solo"}]}"#).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_graph(Path::new("/nonexistent/graph.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/graph.json"));
    }
}
