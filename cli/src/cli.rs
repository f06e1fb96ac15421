use std::path::PathBuf;

/// Population catchment CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "catchment", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Compute population catchments around features
    Run(RunArgs),

    /// Describe a population raster
    Inspect(InspectArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Categorized features (.geojson, .json or .csv)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub features: PathBuf,

    /// Population raster (GeoTIFF); estimates from the density model when omitted
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub raster: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Buffer radii in meters, e.g. --radii 100,200,500
    #[arg(long, value_delimiter = ',')]
    pub radii: Option<Vec<f64>>,

    /// Projected CRS used for buffering, e.g. EPSG:32643
    #[arg(long)]
    pub metric_crs: Option<String>,

    /// Reference system of the raster when the file does not declare one
    #[arg(long)]
    pub raster_crs: Option<String>,

    /// Fail instead of estimating when no raster is given
    #[arg(long)]
    pub no_fallback: bool,

    /// Weight cells by centre-in-buffer instead of exact area overlap
    #[arg(long)]
    pub cell_center: bool,

    /// Seed for reproducible fallback estimates
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use the full raster instead of clipping it to the features
    #[arg(long)]
    pub no_clip: bool,

    /// Process features in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Output directory, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Population raster (GeoTIFF)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Reference system of the raster when the file does not declare one
    #[arg(long)]
    pub raster_crs: Option<String>,

    /// Clip to the bounds of these features (plus the configured margin) before describing
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub clip_to: Option<PathBuf>,

    /// Least margin around the features when clipping, in degrees
    #[arg(long, default_value_t = catchment::config::DEFAULT_CLIP_MARGIN_DEG)]
    pub margin: f64,

    /// Largest buffer radius the clipped raster must still cover, in meters
    #[arg(long, default_value_t = catchment::CatchmentConfig::default().max_radius_m())]
    pub max_radius: f64,

    /// Write the clipped raster here
    #[arg(short, long, value_hint = clap::ValueHint::FilePath, requires = "clip_to")]
    pub output: Option<PathBuf>,
}
