//! GeoJSON feature input.

use std::{fs, path::Path};

use ahash::AHashSet;
use anyhow::{Context, Result, anyhow, bail, ensure};
use geo::{Coord, LineString, Point, Polygon};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::crs::Crs;
use crate::feature::{AttributeValue, Attributes, Category, Feature, FeatureGeometry, FeatureId};

/// Read categorized features from a GeoJSON `FeatureCollection` file.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let bytes = fs::read(path)
        .with_context(|| format!("[io::geojson::read] Failed to read GeoJSON file: {}", path.display()))?;
    read_features_from_bytes(&bytes)
        .with_context(|| format!("[io::geojson::read] Failed to parse features from {}", path.display()))
}

/// Read categorized features from GeoJSON bytes.
///
/// Point and Polygon geometries are kept; other geometry types are skipped
/// with a warning. A collection-level `crs` member applies to every feature;
/// without one, coordinates are WGS84 lon/lat. An unrecognised `crs` leaves
/// the features without a reference system, so they fail individually.
pub fn read_features_from_bytes(bytes: &[u8]) -> Result<Vec<Feature>> {
    let value: Value = serde_json::from_slice(bytes).context("[io::geojson::read] Invalid JSON")?;
    ensure!(value["type"].as_str() == Some("FeatureCollection"), "[io::geojson::read] Expected a FeatureCollection");

    let crs = declared_crs(&value);
    let entries = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson::read] FeatureCollection has no features array"))?;

    let mut seen = AHashSet::with_capacity(entries.len());
    let mut features = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let empty = Map::new();
        let properties = entry["properties"].as_object().unwrap_or(&empty);
        let id = feature_id(entry, properties, index);

        let geometry = match parse_geometry(&entry["geometry"]) {
            Ok(Some(geometry)) => geometry,
            Ok(None) => {
                warn!(feature = %id, geometry = ?entry["geometry"]["type"], "skipping unsupported geometry");
                continue;
            }
            Err(e) => {
                warn!(feature = %id, error = %e, "skipping malformed geometry");
                continue;
            }
        };

        if !seen.insert(id.clone()) {
            bail!("[io::geojson::read] Duplicate feature id {id}");
        }

        features.push(Feature {
            id,
            category: category_of(properties),
            geometry,
            crs,
            attributes: attributes_of(properties),
        });
    }

    debug!(count = features.len(), "read GeoJSON features");
    Ok(features)
}

/// Reference system declared by the collection's `crs` member.
fn declared_crs(value: &Value) -> Option<Crs> {
    let Some(name) = value["crs"]["properties"]["name"].as_str() else {
        return Some(Crs::Geographic);
    };
    name.parse::<Crs>()
        .inspect_err(|e| warn!(crs = name, error = %e, "features declare an unsupported reference system"))
        .ok()
}

/// The feature's `id` member, else `properties.id`, else its position.
fn feature_id(entry: &Value, properties: &Map<String, Value>, index: usize) -> FeatureId {
    match entry.get("id").or_else(|| properties.get("id")) {
        Some(Value::String(s)) if !s.trim().is_empty() => FeatureId::new(s),
        Some(Value::Number(n)) => FeatureId::new(n.to_string()),
        _ => FeatureId::new(format!("feature-{index}")),
    }
}

/// Upstream category label. Missing or unknown labels are `Other`.
fn category_of(properties: &Map<String, Value>) -> Category {
    match properties.get("category").and_then(Value::as_str) {
        None => Category::Other,
        Some(label) => label.parse()
            .inspect_err(|e| debug!(error = %e, "treating unknown category as other"))
            .unwrap_or(Category::Other),
    }
}

/// String and numeric properties become attributes; others are dropped.
fn attributes_of(properties: &Map<String, Value>) -> Attributes {
    let mut attributes = Attributes::new();
    for (key, value) in properties {
        match value {
            Value::String(s) => attributes.insert(key.as_str(), AttributeValue::Text(s.clone())),
            Value::Number(n) => if let Some(n) = n.as_f64() {
                attributes.insert(key.as_str(), AttributeValue::Number(n));
            },
            _ => {}
        }
    }
    attributes
}

/// `Ok(None)` for geometry types the engine does not buffer.
fn parse_geometry(geometry: &Value) -> Result<Option<FeatureGeometry>> {
    let coordinates = &geometry["coordinates"];
    match geometry["type"].as_str() {
        Some("Point") => Ok(Some(FeatureGeometry::Point(Point::from(parse_position(coordinates)?)))),
        Some("Polygon") => {
            let rings = coordinates.as_array()
                .ok_or_else(|| anyhow!("Polygon coordinates must be an array of rings"))?;
            let mut rings = rings.iter().map(parse_ring);
            let exterior = rings.next().ok_or_else(|| anyhow!("Polygon has no exterior ring"))??;
            let interiors = rings.collect::<Result<Vec<_>>>()?;
            Ok(Some(FeatureGeometry::Polygon(Polygon::new(exterior, interiors))))
        }
        _ => Ok(None),
    }
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
    let positions = ring.as_array().ok_or_else(|| anyhow!("ring must be an array of positions"))?;
    let coords = positions.iter().map(parse_position).collect::<Result<Vec<_>>>()?;
    Ok(LineString(coords))
}

fn parse_position(position: &Value) -> Result<Coord<f64>> {
    match position.as_array().map(Vec::as_slice) {
        Some([x, y, ..]) => Ok(Coord {
            x: x.as_f64().ok_or_else(|| anyhow!("x must be a number"))?,
            y: y.as_f64().ok_or_else(|| anyhow!("y must be a number"))?,
        }),
        _ => Err(anyhow!("position must have at least two numbers")),
    }
}

#[cfg(test)]
mod tests {
    use geo::point;

    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "node/1",
             "geometry": {"type": "Point", "coordinates": [77.6245, 12.9352]},
             "properties": {"name": "Corner Cafe", "category": "food_beverage", "amenity": "cafe", "levels": 2}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[77.62, 12.93], [77.63, 12.93], [77.63, 12.94], [77.62, 12.93]]]},
             "properties": {"id": 17, "category": "Healthcare"}},
            {"type": "Feature", "id": "way/9",
             "geometry": {"type": "LineString", "coordinates": [[77.62, 12.93], [77.63, 12.93]]},
             "properties": {"category": "transport"}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [77.61, 12.92]},
             "properties": {"category": "nightlife"}}
        ]
    }"#;

    #[test]
    fn reads_points_and_polygons() {
        let features = read_features_from_bytes(COLLECTION.as_bytes()).unwrap();
        assert_eq!(features.len(), 3);

        let cafe = &features[0];
        assert_eq!(cafe.id.as_str(), "node/1");
        assert_eq!(cafe.category, Category::FoodBeverage);
        assert_eq!(cafe.geometry, FeatureGeometry::Point(point!(x: 77.6245, y: 12.9352)));
        assert_eq!(cafe.crs, Some(Crs::Geographic));
        assert_eq!(cafe.name(), "Corner Cafe");
        assert_eq!(cafe.amenity(), Some("cafe"));
        assert_eq!(cafe.attributes.number("levels"), Some(2.0));

        let clinic = &features[1];
        assert_eq!(clinic.id.as_str(), "17");
        assert_eq!(clinic.category, Category::Healthcare);
        assert!(!clinic.geometry.is_point());
        assert_eq!(clinic.name(), "Unknown");
    }

    #[test]
    fn unknown_category_is_other_and_ids_fall_back_to_index() {
        let features = read_features_from_bytes(COLLECTION.as_bytes()).unwrap();
        assert_eq!(features[2].category, Category::Other);
        assert_eq!(features[2].id.as_str(), "feature-3");
    }

    #[test]
    fn declared_crs_applies_to_features() {
        let json = r#"{"type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32643"}},
            "features": [{"type": "Feature", "id": "a", "geometry": {"type": "Point", "coordinates": [500000, 1430000]}, "properties": {}}]}"#;
        let features = read_features_from_bytes(json.as_bytes()).unwrap();
        assert_eq!(features[0].crs, Some(Crs::Utm { zone: 43, south: false }));

        let unknown = json.replace("32643", "3857");
        let features = read_features_from_bytes(unknown.as_bytes()).unwrap();
        assert_eq!(features[0].crs, None);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let json = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "id": "a", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}},
            {"type": "Feature", "id": "a", "geometry": {"type": "Point", "coordinates": [3, 4]}, "properties": {}}]}"#;
        assert!(read_features_from_bytes(json.as_bytes()).is_err());
    }

    #[test]
    fn not_a_collection() {
        assert!(read_features_from_bytes(br#"{"type": "Feature"}"#).is_err());
    }
}
