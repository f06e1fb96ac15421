//! Single-band GeoTIFF input and output.
//!
//! Georeferencing comes from `ModelTransformation`, or from
//! `ModelPixelScale` + `ModelTiepoint`; the CRS from the GeoKey directory;
//! no-data from GDAL's ASCII no-data tag.

use std::{fs::File, io::{BufReader, BufWriter, Read, Seek, Write}, path::Path};

use anyhow::{Context, Result, anyhow, bail, ensure};
use tiff::{
    ColorType,
    decoder::{Decoder, DecodingResult},
    encoder::{TiffEncoder, colortype::Gray64Float},
    tags::Tag,
};
use tracing::debug;

use crate::crs::Crs;
use crate::raster::{GeoTransform, RasterGrid};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Read a GeoTIFF from disk. `crs` overrides whatever the file declares.
pub fn read_raster(path: &Path, crs: Option<Crs>) -> Result<RasterGrid> {
    let file = File::open(path)
        .with_context(|| format!("[io::geotiff::read] Failed to open raster: {}", path.display()))?;
    read_raster_from(BufReader::new(file), crs)
        .with_context(|| format!("[io::geotiff::read] Failed to read raster from {}", path.display()))
}

/// Read a GeoTIFF from any seekable source.
pub fn read_raster_from<R: Read + Seek>(reader: R, crs: Option<Crs>) -> Result<RasterGrid> {
    let mut decoder = Decoder::new(reader).context("[io::geotiff::read] Not a TIFF")?;

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => bail!("[io::geotiff::read] Only single-band rasters are supported, found {other:?}"),
    }
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let values = match decoder.read_image().context("[io::geotiff::read] Failed to decode pixels")? {
        DecodingResult::F64(buf) => buf,
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        #[allow(unreachable_patterns)]
        _ => bail!("[io::geotiff::read] Unsupported pixel type"),
    };
    ensure!(values.len() == rows * cols, "[io::geotiff::read] Expected {} pixels, decoded {}", rows * cols, values.len());

    let transform = read_transform(&mut decoder)?;
    let crs = match crs {
        Some(crs) => crs,
        None => read_crs(&mut decoder)?,
    };
    let nodata = read_nodata(&mut decoder);
    debug!(rows, cols, %crs, ?nodata, "read GeoTIFF");

    Ok(RasterGrid::from_vec(values, rows, cols, transform, crs, nodata)?)
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)) {
        ensure!(m.len() >= 8, "[io::geotiff::read] ModelTransformation has {} values", m.len());
        return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
    }

    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|_| anyhow!("[io::geotiff::read] Raster has no georeferencing tags"))?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|_| anyhow!("[io::geotiff::read] Raster has a pixel scale but no tiepoint"))?;
    ensure!(scale.len() >= 2 && tiepoint.len() >= 6, "[io::geotiff::read] Malformed pixel scale or tiepoint");

    // tiepoint = [I, J, K, X, Y, Z], scale = [sx, sy, sz]
    Ok(GeoTransform::north_up(
        tiepoint[3] - tiepoint[0] * scale[0],
        tiepoint[4] + tiepoint[1] * scale[1],
        scale[0],
        -scale[1],
    ))
}

/// EPSG code from the GeoKey directory: projected CS first, then geographic type.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Crs> {
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .map_err(|_| anyhow!("[io::geotiff::read] Raster declares no reference system; pass one explicitly"))?;

    let lookup = |id: u16| keys.get(4..).unwrap_or_default()
        .chunks_exact(4)
        .find(|entry| entry[0] == id && entry[1] == 0)
        .map(|entry| entry[3]);

    let code = lookup(PROJECTED_CS_TYPE)
        .or_else(|| lookup(GEOGRAPHIC_TYPE))
        .or_else(|| (lookup(GT_MODEL_TYPE) == Some(MODEL_TYPE_GEOGRAPHIC)).then_some(4326))
        .ok_or_else(|| anyhow!("[io::geotiff::read] GeoKey directory has no EPSG code"))?;
    Crs::from_epsg(code as u32)
        .ok_or_else(|| anyhow!("[io::geotiff::read] Unsupported reference system EPSG:{code}"))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok()
}

/// Write a grid as a 64-bit float GeoTIFF.
pub fn write_raster(grid: &RasterGrid, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[io::geotiff::write] Failed to create raster: {}", path.display()))?;
    write_raster_to(grid, BufWriter::new(file))
        .with_context(|| format!("[io::geotiff::write] Failed to write raster to {}", path.display()))
}

/// Write a grid to any seekable sink.
pub fn write_raster_to<W: Write + Seek>(grid: &RasterGrid, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray64Float>(grid.cols() as u32, grid.rows() as u32)?;

    let gt = grid.transform();
    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])?;
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image.encoder().write_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION), &matrix[..])?;
    }

    let crs = grid.crs();
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };
    let keys: [u16; 16] = [
        1, 1, 0, 3,
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg() as u16,
    ];
    image.encoder().write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &keys[..])?;

    if let Some(nodata) = grid.nodata() {
        image.encoder().write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    let data = grid.data().iter().copied().collect::<Vec<f64>>();
    image.write_data(&data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn round_trip(grid: &RasterGrid, crs: Option<Crs>) -> RasterGrid {
        let mut bytes = Vec::new();
        write_raster_to(grid, Cursor::new(&mut bytes)).unwrap();
        read_raster_from(Cursor::new(bytes), crs).unwrap()
    }

    #[test]
    fn metric_raster_round_trip() {
        let grid = RasterGrid::from_vec(
            vec![1.0, 2.0, -9999.0, 4.0, 5.5, 6.0],
            2, 3,
            GeoTransform::north_up(640_000.0, 1_430_000.0, 100.0, -100.0),
            Crs::Utm { zone: 43, south: false },
            Some(-9999.0),
        ).unwrap();
        let back = round_trip(&grid, None);
        assert_eq!(back.crs(), grid.crs());
        assert_eq!(back.transform(), grid.transform());
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.data(), grid.data());
        assert_eq!(back.valid(0, 2), None);
    }

    #[test]
    fn geographic_raster_round_trip() {
        let res = 0.000833333;
        let grid = RasterGrid::from_vec(vec![0.5; 12], 3, 4, GeoTransform::north_up(77.5, 13.0, res, -res), Crs::Geographic, None).unwrap();
        let back = round_trip(&grid, None);
        assert_eq!(back.crs(), Crs::Geographic);
        assert_eq!(back.nodata(), None);
        assert_eq!(back.resolution(), (res, res));
    }

    #[test]
    fn rotated_transform_round_trip() {
        let gt = GeoTransform::from_gdal([500.0, 2.0, 0.5, 800.0, 0.25, -2.0]);
        let grid = RasterGrid::from_vec(vec![1.0; 4], 2, 2, gt, Crs::Utm { zone: 43, south: false }, None).unwrap();
        assert_eq!(round_trip(&grid, None).transform(), &gt);
    }

    #[test]
    fn explicit_crs_overrides_file() {
        let grid = RasterGrid::from_vec(vec![1.0; 4], 2, 2, GeoTransform::north_up(0.0, 2.0, 1.0, -1.0), Crs::Geographic, None).unwrap();
        let back = round_trip(&grid, Some(Crs::Utm { zone: 44, south: false }));
        assert_eq!(back.crs(), Crs::Utm { zone: 44, south: false });
    }

    #[test]
    fn garbage_is_not_a_raster() {
        assert!(read_raster_from(Cursor::new(b"not a tiff".to_vec()), None).is_err());
    }
}
