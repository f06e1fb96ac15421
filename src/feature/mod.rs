mod attributes;
mod geometry;

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::bail;
use geo::{BoundingRect, Coord, Rect};

pub use attributes::{AttributeValue, Attributes};
pub use geometry::FeatureGeometry;

use crate::crs::Crs;

/// Stable identifier of a feature, as supplied by the upstream extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(Arc<str>);

impl FeatureId {
    pub fn new(id: impl AsRef<str>) -> Self { Self(Arc::from(id.as_ref())) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self { Self::new(id) }
}

/// Category label assigned upstream. Anything unlabeled is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    FoodBeverage,
    Healthcare,
    Education,
    Financial,
    Transport,
    Retail,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::FoodBeverage, Self::Healthcare, Self::Education, Self::Financial,
        Self::Transport, Self::Retail, Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodBeverage => "food_beverage",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::Financial => "financial",
            Self::Transport => "transport",
            Self::Retail => "retail",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let label = s.trim();
        match Self::ALL.iter().find(|c| c.as_str().eq_ignore_ascii_case(label)) {
            Some(category) => Ok(*category),
            None => bail!("[feature::Category] unknown category label: {label:?}"),
        }
    }
}

/// A categorized point of interest. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub category: Category,
    pub geometry: FeatureGeometry,
    /// Reference system of `geometry`; `None` when the source did not declare a usable one.
    pub crs: Option<Crs>,
    pub attributes: Attributes,
}

impl Feature {
    /// A feature in WGS84 lon/lat.
    pub fn new(id: impl Into<FeatureId>, category: Category, geometry: impl Into<FeatureGeometry>) -> Self {
        Self {
            id: id.into(),
            category,
            geometry: geometry.into(),
            crs: Some(Crs::Geographic),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Display name, defaulting to "Unknown".
    #[inline] pub fn name(&self) -> &str { self.attributes.text_or("name", "Unknown") }

    #[inline] pub fn amenity(&self) -> Option<&str> { self.attributes.text("amenity") }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self { Self::new(id) }
}

/// Bounding rectangle of all feature geometries declared in `crs`.
pub fn bounds_of(features: &[Feature], crs: Crs) -> Option<Rect<f64>> {
    features.iter()
        .filter(|f| f.crs == Some(crs))
        .filter_map(|f| match &f.geometry {
            FeatureGeometry::Point(p) => Some(Rect::new(p.0, p.0)),
            FeatureGeometry::Polygon(p) => p.bounding_rect(),
        })
        .reduce(|a, b| Rect::new(
            Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
            Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
        ))
}

/// WGS84 bounds of the geographic features grown by `margin_deg` on every side.
pub fn study_area(features: &[Feature], margin_deg: f64) -> Option<Rect<f64>> {
    let bounds = bounds_of(features, Crs::Geographic)?;
    Some(Rect::new(
        Coord { x: bounds.min().x - margin_deg, y: bounds.min().y - margin_deg },
        Coord { x: bounds.max().x + margin_deg, y: bounds.max().y + margin_deg },
    ))
}

#[cfg(test)]
mod tests {
    use geo::point;

    use super::*;

    #[test]
    fn category_labels_parse() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert_eq!("Retail".parse::<Category>().unwrap(), Category::Retail);
        assert!("nightlife".parse::<Category>().is_err());
    }

    #[test]
    fn name_defaults_to_unknown() {
        let feature = Feature::new("n1", Category::Other, point!(x: 77.6, y: 12.9));
        assert_eq!(feature.name(), "Unknown");

        let named = feature.with_attributes(Attributes::new().with_text("name", "Corner Cafe"));
        assert_eq!(named.name(), "Corner Cafe");
    }

    #[test]
    fn bounds_cover_all_points() {
        let features = vec![
            Feature::new("a", Category::Retail, point!(x: 77.60, y: 12.92)),
            Feature::new("b", Category::Retail, point!(x: 77.64, y: 12.95)),
            Feature::new("c", Category::Retail, point!(x: 10.0, y: 10.0)).with_crs(None),
        ];
        let bounds = bounds_of(&features, Crs::Geographic).unwrap();
        assert_eq!(bounds.min(), Coord { x: 77.60, y: 12.92 });
        assert_eq!(bounds.max(), Coord { x: 77.64, y: 12.95 });

        let area = study_area(&features, 0.01).unwrap();
        assert!((area.min().x - 77.59).abs() < 1e-12 && (area.max().y - 12.96).abs() < 1e-12);
    }
}
