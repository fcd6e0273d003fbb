use crate::config::{LayerToggles, Settings, load_settings};
use crate::diagnostics::write_report;
use crate::ir::Graph;
use crate::parser::{parse_graph, read_graph};
use crate::raster::OutputFormat as ImageFormat;
use crate::render::Renderer;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "nmr", version, about = "Print-resolution network map renderer")]
pub struct Args {
    /// Graph JSON file, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file. Defaults to a descriptive name inside --out-dir.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Directory for derived file names and cluster heatmaps
    #[arg(long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Output format; inferred from the output extension when omitted
    #[arg(short = 'e', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Settings file (JSON or JSON5)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// What to render
    #[arg(short = 't', long = "type", value_enum, default_value = "map")]
    pub render_type: RenderType,

    /// Date the graph describes, used in file names and the stats layer
    #[arg(long = "date")]
    pub date: Option<String>,

    /// End of the date range, for graphs spanning a period
    #[arg(long = "date-to")]
    pub date_to: Option<String>,

    /// Render only this tile (row-major index)
    #[arg(long = "tile")]
    pub tile: Option<u32>,

    /// Render even when the output file already exists
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Write a JSON render report here
    #[arg(long = "report")]
    pub report: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpg,
}

impl From<OutputFormat> for ImageFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpg => ImageFormat::Jpeg,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderType {
    /// The full layer stack as configured
    Map,
    /// Density heatmap over the background only
    Heatmap,
    /// One heatmap per cluster modality
    ClusterHeatmaps,
}

impl RenderType {
    fn name(self) -> &'static str {
        match self {
            RenderType::Map => "map",
            RenderType::Heatmap => "heatmap",
            RenderType::ClusterHeatmaps => "cluster_heatmaps",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(tile) = args.tile {
        settings.image.tile_to_render = Some(tile);
    }
    if settings.stats.stats_date.is_none() {
        settings.stats.stats_date = match (&args.date, &args.date_to) {
            (Some(from), Some(to)) => Some(format!("{from} - {to}")),
            (Some(from), None) => Some(from.clone()),
            _ => None,
        };
    }
    if args.render_type == RenderType::Heatmap {
        settings.layers = LayerToggles {
            layer_background: true,
            layer_heatmap: true,
            ..LayerToggles::none()
        };
    }

    settings.validate().context("invalid settings")?;
    let graph = read_input(&args.input)?;

    if args.render_type == RenderType::ClusterHeatmaps {
        let mut renderer = Renderer::new(&graph, settings)?;
        let written = renderer
            .render_cluster_heatmaps(&args.out_dir)
            .with_context(|| format!("rendering cluster heatmaps into {}", args.out_dir.display()))?;
        log::info!("wrote {} cluster heatmap(s)", written.len());
        return Ok(());
    }

    let format = match (args.format, &args.output) {
        (Some(format), _) => format.into(),
        (None, Some(path)) => ImageFormat::from_path(path)?,
        (None, None) => ImageFormat::Png,
    };
    let output = match &args.output {
        Some(path) => path.clone(),
        None => args.out_dir.join(artifact_name(
            args.render_type,
            args.date.as_deref(),
            args.date_to.as_deref(),
            &settings,
            format,
        )),
    };
    if output.exists() && !args.force {
        log::info!("{} already exists, skipping (use --force to re-render)", output.display());
        return Ok(());
    }

    let mut renderer = Renderer::new(&graph, settings)?;
    let report = renderer
        .render_to_file(&output, Some(format))
        .with_context(|| format!("rendering {}", output.display()))?;
    if let Some(path) = &args.report {
        write_report(path, &report).with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn read_input(path: &Path) -> Result<Graph> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return parse_graph(&buf).context("parsing graph from stdin");
    }
    Ok(read_graph(path)?)
}

/// `{type}_{date}[_{date_to}]_{w}x{h}mm_{dpi}dpi.{ext}`, plus the tile
/// index when a single tile is rendered.
fn artifact_name(
    render_type: RenderType,
    date: Option<&str>,
    date_to: Option<&str>,
    settings: &Settings,
    format: ImageFormat,
) -> String {
    let image = &settings.image;
    let mut name = format!("{}_{}", render_type.name(), date.unwrap_or("undated"));
    if let Some(to) = date_to {
        name.push('_');
        name.push_str(to);
    }
    name.push_str(&format!(
        "_{}x{}mm_{}dpi",
        image.image_width, image.image_height, image.output_dpi
    ));
    if let (Some(tile), Some(count)) = (image.tile_to_render, image.tile_count()) {
        name.push_str(&format!("_tile{tile}of{count}"));
    }
    format!("{name}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_describe_the_render() {
        let mut settings = Settings::default();
        settings.image.image_width = 600.0;
        settings.image.image_height = 400.0;
        settings.image.output_dpi = 300.0;
        assert_eq!(
            artifact_name(RenderType::Map, Some("2024-01-01"), None, &settings, ImageFormat::Png),
            "map_2024-01-01_600x400mm_300dpi.png"
        );
        assert_eq!(
            artifact_name(
                RenderType::Heatmap,
                Some("2024-01-01"),
                Some("2024-02-01"),
                &settings,
                ImageFormat::Jpeg
            ),
            "heatmap_2024-01-01_2024-02-01_600x400mm_300dpi.jpg"
        );
        settings.image.tile_factor = 2;
        settings.image.tile_to_render = Some(3);
        assert_eq!(
            artifact_name(RenderType::Map, None, None, &settings, ImageFormat::Png),
            "map_undated_600x400mm_300dpi_tile3of4.png"
        );
    }

    #[test]
    fn args_parse_counts_verbosity() {
        let args = Args::try_parse_from(["nmr", "-i", "graph.json", "-vv", "-t", "cluster-heatmaps", "--force"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.render_type, RenderType::ClusterHeatmaps);
        assert!(args.force);
        assert!(args.output.is_none());
    }
}
