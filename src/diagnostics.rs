use crate::closeness::Closeness;
use crate::ir::FillReport;
use crate::labels::Placement;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// What a render pass recovered from, dropped and computed. Nothing here is
/// an error; it makes the silent degradations observable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderReport {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub tiles: Vec<u32>,
    pub nodes: usize,
    pub edges: usize,
    pub fill: FillReport,
    pub labels: LabelDump,
    pub fields: Vec<FieldDump>,
    pub closeness: Option<Closeness>,
    pub layers: Vec<LayerDump>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LabelDump {
    pub placed: usize,
    pub important: usize,
    pub rejected: usize,
    pub over_budget: usize,
    pub skipped: usize,
}

impl LabelDump {
    pub fn from_placement(placement: &Placement, important: usize) -> Self {
        Self {
            placed: placement.labels.len(),
            important,
            rejected: placement.rejected,
            over_budget: placement.over_budget,
            skipped: placement.skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDump {
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    pub ratio: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerDump {
    pub name: &'static str,
    /// Summed over tiles.
    pub millis: f64,
}

impl RenderReport {
    pub fn record_layer(&mut self, name: &'static str, millis: f64) {
        match self.layers.iter_mut().find(|l| l.name == name) {
            Some(layer) => layer.millis += millis,
            None => self.layers.push(LayerDump { name, millis }),
        }
    }
}

pub fn write_report(path: &Path, report: &RenderReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
