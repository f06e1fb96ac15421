use anyhow::{Context, Result, bail};
use catchment::{Crs, io, raster::catchment_area};
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::InspectArgs) -> Result<()> {
    let crs = args.raster_crs.as_deref()
        .map(|s| s.parse::<Crs>().with_context(|| format!("[inspect] Invalid reference system {s:?}")))
        .transpose()?;

    info!("[inspect] loading raster from {}", args.raster.display());
    let mut raster = io::geotiff::read_raster(&args.raster, crs)?;

    if let Some(path) = &args.clip_to {
        let features = io::read_features(path)?;
        let Some(area) = catchment_area(&features, &raster, args.max_radius, args.margin) else {
            bail!("[inspect] {} has no WGS84 features to clip to", path.display());
        };
        let Some(clipped) = raster.clip_geographic(&area)? else {
            bail!("[inspect] raster does not overlap the features in {}", path.display());
        };
        info!("[inspect] clipped to {}x{} cells", clipped.rows(), clipped.cols());
        raster = clipped;

        if let Some(out) = &args.output {
            io::geotiff::write_raster(&raster, out)?;
            info!("[inspect] wrote {}", out.display());
        }
    }

    let summary = raster.summary();
    println!("{}", io::json::to_pretty_string(&summary)?);
    if summary.has_negative {
        info!("[inspect] raster has negative cells; totals over nested buffers may decrease");
    }
    Ok(())
}
