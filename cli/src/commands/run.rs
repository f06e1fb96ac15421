use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use catchment::{
    BatchOptions, CatchmentConfig, CoverageMode, Crs, RasterGrid, io, raster::catchment_area, run_batch,
};
use tracing::{info, warn};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let out_dir = args.output.clone().unwrap_or_else(|| PathBuf::from("."));

    info!("[run] loading features from {}", args.features.display());
    let features = io::read_features(&args.features)?;
    info!("[run] {} features", features.len());

    let raster = match &args.raster {
        None => None,
        Some(path) => {
            let crs = parse_crs(args.raster_crs.as_deref())?;
            info!("[run] loading raster from {}", path.display());
            let raster = io::geotiff::read_raster(path, crs)?;
            Some(if args.no_clip { raster } else { clip(raster, &features, &config)? })
        }
    };

    let options = BatchOptions { parallel: args.parallel, cancel: None };
    let table = run_batch(&features, raster.as_ref(), &config, &options)?;
    let summary = table.summary(raster.as_ref().map(RasterGrid::summary));

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("[run] Failed to create output directory {}", out_dir.display()))?;
    let records_path = out_dir.join("catchment_records.csv");
    let wide_path = out_dir.join("catchment_wide.csv");
    let summary_path = out_dir.join("catchment_summary.json");

    io::csv::write_records(&table, &records_path)?;
    io::csv::write_wide(&table, &wide_path)?;
    io::json::write_summary(&summary, &summary_path)?;

    for radius in &summary.per_radius {
        if let Some(mean) = radius.mean_population_total {
            info!("[run] {}m: mean population {:.0} over {} features", radius.radius_m, mean, radius.records);
        }
    }
    info!("[run] wrote {}, {} and {}", records_path.display(), wide_path.display(), summary_path.display());
    Ok(())
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(args: &crate::cli::RunArgs) -> Result<CatchmentConfig> {
    let mut config = match &args.config {
        Some(path) => CatchmentConfig::from_toml_file(path)?,
        None => CatchmentConfig::default(),
    };
    if let Some(radii) = &args.radii { config.radii_m = radii.clone() }
    if let Some(crs) = parse_crs(args.metric_crs.as_deref())? { config.metric_crs = Some(crs) }
    if args.no_fallback { config.allow_fallback = false }
    if args.cell_center { config.coverage_mode = CoverageMode::CellCenter }
    if let Some(seed) = args.seed { config.fallback.seed = Some(seed) }
    config.validate()?;
    Ok(config)
}

fn parse_crs(value: Option<&str>) -> Result<Option<Crs>> {
    value.map(|s| s.parse::<Crs>().with_context(|| format!("[run] Invalid reference system {s:?}")))
        .transpose()
}

/// Clip the raster to the area the largest buffer can reach. Keeps the full raster if they don't overlap.
fn clip(raster: RasterGrid, features: &[catchment::Feature], config: &CatchmentConfig) -> Result<RasterGrid> {
    let Some(area) = catchment_area(features, &raster, config.max_radius_m(), config.clip_margin_deg) else { return Ok(raster) };
    match raster.clip_geographic(&area)? {
        Some(clipped) => {
            info!("[run] clipped raster from {}x{} to {}x{}", raster.rows(), raster.cols(), clipped.rows(), clipped.cols());
            Ok(clipped)
        }
        None => {
            warn!("[run] raster does not overlap the features; every buffer will report no coverage");
            Ok(raster)
        }
    }
}
