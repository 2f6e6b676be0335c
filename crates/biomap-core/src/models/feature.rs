use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw feature as delivered by a layer reader, geometry in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    pub id: String,
    pub geometry: geo::Geometry<f64>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl SourceFeature {
    /// First non-empty string (or number) among the given property names.
    pub fn property_str(&self, names: &[String]) -> Option<String> {
        names.iter().find_map(|name| match self.properties.get(name)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// An administrative polygon ready for intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub id: String,
    pub name: String,
    pub external_code: Option<String>,
    pub geometry: geo::MultiPolygon<f64>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Tabular row joined to a polygon by code or name. Absent fields are null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    pub external_code: Option<String>,
    pub values: BTreeMap<String, f64>,
}

impl AttributeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.external_code = Some(code.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// A polygon that intersects the analysis buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPolygon {
    pub feature_id: String,
    pub name: String,
    pub external_code: Option<String>,
    /// Request point to polygon centroid, metric, rounded to 0.01 km
    pub distance_km: f64,
    pub intersects: bool,
    pub contains_point: bool,
    /// Share of the polygon's area inside the buffer
    pub intersection_percent: f64,
    pub area_km2: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, f64>,
}

impl MatchedPolygon {
    pub fn attribute(&self, field: &str) -> Option<f64> {
        self.attributes.get(field).copied()
    }
}
