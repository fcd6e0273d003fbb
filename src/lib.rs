pub mod closeness;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod ir;
pub mod labels;
pub mod parser;
pub mod raster;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Settings, load_settings};
pub use error::RenderError;
pub use ir::{Graph, MapGraph};
pub use parser::{parse_graph, read_graph};
pub use raster::{OutputFormat, RasterLayer};
pub use render::{RenderOutput, Renderer};
