use std::path::PathBuf;

/// Failures that abort a render call. Recoverable input defects, label
/// geometry edge cases and budget overflows never surface here; they are
/// logged and counted in [`crate::diagnostics::RenderReport`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot read graph file {}: {source}", path.display())]
    GraphRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse graph file {}: {source}", path.display())]
    GraphParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot read settings file {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse settings file {}: {message}", path.display())]
    SettingsParse { path: PathBuf, message: String },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("layer `{layer}` is enabled but settings have no `node_clusters` descriptor")]
    MissingClusterDescriptor { layer: &'static str },
    #[error("unknown output format `{0}` (expected png, jpg or jpeg)")]
    UnknownFormat(String),
    #[error("cannot allocate a {width}x{height} raster")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("cannot write output {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode output {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },
}
