use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::CatchmentError;

/// The coordinate reference systems the engine understands.
///
/// Geographic is WGS84 lon/lat in degrees. UTM zones are WGS84-based and
/// measured in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Geographic,
    Utm { zone: u8, south: bool },
}

impl Crs {
    /// Look up a CRS by EPSG code (4326, 326zz, 327zz).
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Self::Geographic),
            32601..=32660 => Some(Self::Utm { zone: (code - 32600) as u8, south: false }),
            32701..=32760 => Some(Self::Utm { zone: (code - 32700) as u8, south: true }),
            _ => None,
        }
    }

    /// EPSG code of this CRS.
    pub fn epsg(&self) -> u32 {
        match *self {
            Self::Geographic => 4326,
            Self::Utm { zone, south: false } => 32600 + zone as u32,
            Self::Utm { zone, south: true } => 32700 + zone as u32,
        }
    }

    /// UTM zone containing a lon/lat position.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self::Utm { zone, south: lat < 0.0 }
    }

    #[inline] pub fn is_geographic(&self) -> bool { matches!(self, Self::Geographic) }

    #[inline] pub fn is_metric(&self) -> bool { matches!(self, Self::Utm { .. }) }

    /// Central meridian of a UTM zone, in degrees.
    pub fn central_meridian(&self) -> Option<f64> {
        match *self {
            Self::Geographic => None,
            Self::Utm { zone, .. } => Some(zone as f64 * 6.0 - 183.0),
        }
    }

    /// PROJ.4 definition used to build the transform.
    pub fn proj4(&self) -> String {
        match *self {
            Self::Geographic => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            Self::Utm { zone, south } => {
                let south = if south { " +south" } else { "" };
                format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = CatchmentError;

    /// Accepts `EPSG:32643`, `epsg:4326`, a bare code, or the OGC CRS84 URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") || trimmed.eq_ignore_ascii_case("CRS84") {
            return Ok(Self::Geographic);
        }

        let code = trimmed.rsplit(':').next().unwrap_or(trimmed);
        code.parse::<u32>().ok()
            .and_then(Self::from_epsg)
            .ok_or_else(|| CatchmentError::Projection(format!("unsupported coordinate reference system: {s}")))
    }
}

impl TryFrom<String> for Crs {
    type Error = CatchmentError;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self { crs.to_string() }
}
