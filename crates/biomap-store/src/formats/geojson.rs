//! GeoJSON layer reader.

use std::fs;
use std::path::{Path, PathBuf};

use biomap_core::error::{BiomapError, Result};
use biomap_core::models::SourceFeature;
use biomap_core::ports::FeatureSource;

use crate::crs::{parse_geojson_crs, reproject_to_wgs84, WGS84};

/// Reads a FeatureCollection, a single Feature or a bare Geometry.
///
/// A legacy `crs` member is honored; without one the data is taken as WGS84.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    path: PathBuf,
}

impl GeoJsonSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn format_error(&self, message: String) -> BiomapError {
        BiomapError::Format {
            format: "GeoJSON".to_string(),
            path: self.path.clone(),
            message,
        }
    }

    fn convert_feature(&self, feature: geojson::Feature, idx: usize) -> Option<SourceFeature> {
        let id = feature
            .id
            .as_ref()
            .map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
            .unwrap_or_else(|| idx.to_string());

        let Some(geometry) = feature.geometry else {
            tracing::warn!(layer = %self.path.display(), feature_id = %id, "Skipping feature without geometry");
            return None;
        };
        let geometry = match geo::Geometry::<f64>::try_from(geometry.value) {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(layer = %self.path.display(), feature_id = %id, error = %e, "Skipping unconvertible geometry");
                return None;
            }
        };

        Some(SourceFeature {
            id,
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

impl FeatureSource for GeoJsonSource {
    fn describe(&self) -> String {
        format!("GeoJSON {}", super::layer_name(&self.path))
    }

    fn load(&self) -> Result<Vec<SourceFeature>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            BiomapError::unavailable(self.describe(), format!("{}: {}", self.path.display(), e))
        })?;
        let parsed: geojson::GeoJson = content
            .parse()
            .map_err(|e| self.format_error(format!("Failed to parse GeoJSON: {}", e)))?;

        let (features, epsg) = match parsed {
            geojson::GeoJson::FeatureCollection(fc) => {
                let epsg = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|fm| fm.get("crs"))
                    .and_then(parse_geojson_crs)
                    .unwrap_or(WGS84);
                let features = fc
                    .features
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idx, feature)| self.convert_feature(feature, idx))
                    .collect();
                (features, epsg)
            }
            geojson::GeoJson::Feature(feature) => (self.convert_feature(feature, 0).into_iter().collect(), WGS84),
            geojson::GeoJson::Geometry(geometry) => {
                let geometry = geo::Geometry::<f64>::try_from(geometry.value)
                    .map_err(|e| self.format_error(e.to_string()))?;
                let feature = SourceFeature {
                    id: "0".to_string(),
                    geometry,
                    properties: serde_json::Map::new(),
                };
                (vec![feature], WGS84)
            }
        };

        tracing::debug!(layer = %self.path.display(), features = features.len(), epsg, "GeoJSON layer read");
        reproject_to_wgs84(features, epsg)
    }
}
