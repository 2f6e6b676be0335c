//! Nearest-feature search over auxiliary infrastructure layers.

use biomap_core::config::InfrastructureLayerConfig;
use biomap_core::error::Result;
use biomap_core::models::{MetricPoint, Point, SourceFeature};
use biomap_core::round_to;
use geo::{Closest, ClosestPoint, Geometry};
use serde::{Deserialize, Serialize};

use crate::projection::ProjectionService;

/// Known properties of an infrastructure feature plus whatever else the
/// source carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub additional_properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureFeature {
    pub properties: InfrastructureProperties,
    /// Geometry in the metric CRS
    pub geometry: Geometry<f64>,
}

/// One layer, already projected to meters.
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureLayer {
    pub layer_type: String,
    pub display_name: String,
    pub max_distance_km: f64,
    features: Vec<InfrastructureFeature>,
    load_error: Option<String>,
}

impl InfrastructureLayer {
    /// Project lon/lat features once so lookups never touch PROJ per feature.
    /// A feature that fails to project is skipped with a warning.
    pub fn from_features(
        config: &InfrastructureLayerConfig,
        features: Vec<SourceFeature>,
        projection: &ProjectionService,
        name_fields: &[String],
    ) -> Self {
        let mut projected = Vec::with_capacity(features.len());
        let mut skipped = 0usize;
        for feature in features {
            let geometry = match projection.geometry_to_metric(&feature.geometry) {
                Ok(geometry) => geometry,
                Err(e) => {
                    tracing::warn!(
                        layer = %config.layer_type,
                        feature_id = %feature.id,
                        error = %e,
                        "Skipping infrastructure feature that failed to project"
                    );
                    skipped += 1;
                    continue;
                }
            };
            let name = feature.property_str(name_fields);
            projected.push(InfrastructureFeature {
                properties: InfrastructureProperties {
                    name,
                    additional_properties: feature.properties,
                },
                geometry,
            });
        }

        tracing::info!(
            layer = %config.layer_type,
            features = projected.len(),
            skipped,
            "Infrastructure layer loaded"
        );

        Self {
            layer_type: config.layer_type.clone(),
            display_name: config.display_name.clone(),
            max_distance_km: config.max_distance_km,
            features: projected,
            load_error: None,
        }
    }

    /// Placeholder for a layer whose sources could not be read.
    pub fn unavailable(config: &InfrastructureLayerConfig, reason: impl Into<String>) -> Self {
        Self {
            layer_type: config.layer_type.clone(),
            display_name: config.display_name.clone(),
            max_distance_km: config.max_distance_km,
            features: Vec::new(),
            load_error: Some(reason.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Linear scan for the closest feature; distance in meters.
    pub fn nearest(&self, point: &MetricPoint) -> Option<(&InfrastructureFeature, f64)> {
        let target = geo::Point::new(point.x, point.y);
        let mut best: Option<(&InfrastructureFeature, f64)> = None;

        for feature in &self.features {
            let distance = match feature.geometry.closest_point(&target) {
                Closest::Intersection(_) => 0.0,
                Closest::SinglePoint(p) => (p.x() - point.x).hypot(p.y() - point.y),
                Closest::Indeterminate => continue,
            };
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((feature, distance)),
            }
        }
        best
    }

    fn find(&self, point: &MetricPoint) -> InfrastructureMatch {
        let mut result = InfrastructureMatch {
            layer_type: self.layer_type.clone(),
            display_name: self.display_name.clone(),
            name: None,
            distance_km: None,
            found: false,
            max_distance_km: self.max_distance_km,
            properties: None,
            note: None,
            error: None,
        };

        if let Some(error) = &self.load_error {
            result.error = Some(error.clone());
            return result;
        }

        match self.nearest(point) {
            Some((feature, distance_m)) => {
                let distance_km = distance_m / 1000.0;
                result.distance_km = Some(round_to(distance_km, 2));
                if distance_km <= self.max_distance_km {
                    result.found = true;
                    result.name = Some(
                        feature
                            .properties
                            .name
                            .clone()
                            .unwrap_or_else(|| self.display_name.clone()),
                    );
                    result.properties = Some(feature.properties.clone());
                } else {
                    result.note = Some(format!(
                        "Nearest {} is beyond the {} km search limit",
                        self.display_name, self.max_distance_km
                    ));
                }
            }
            None => {
                result.note = Some(format!("No {} features available", self.display_name));
            }
        }
        result
    }
}

/// Per-layer nearest-feature result.
///
/// When `found` is false `distance_km` still carries the measured minimum
/// (if the layer has any features) and `properties` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureMatch {
    pub layer_type: String,
    pub display_name: String,
    pub name: Option<String>,
    pub distance_km: Option<f64>,
    pub found: bool,
    pub max_distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<InfrastructureProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary row for the infrastructure-types listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub layer_type: String,
    pub display_name: String,
    pub max_distance_km: f64,
    pub feature_count: usize,
    pub available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InfrastructureFinder {
    layers: Vec<InfrastructureLayer>,
}

impl InfrastructureFinder {
    pub fn new(layers: Vec<InfrastructureLayer>) -> Self {
        Self { layers }
    }

    /// One match per configured layer, in configuration order. A failed
    /// layer never affects the others.
    pub fn find_nearest(
        &self,
        projection: &ProjectionService,
        point: &Point,
    ) -> Result<Vec<InfrastructureMatch>> {
        let metric = projection.to_metric(point)?;
        Ok(self.layers.iter().map(|layer| layer.find(&metric)).collect())
    }

    pub fn layers(&self) -> &[InfrastructureLayer] {
        &self.layers
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|layer| LayerSummary {
                layer_type: layer.layer_type.clone(),
                display_name: layer.display_name.clone(),
                max_distance_km: layer.max_distance_km,
                feature_count: layer.len(),
                available: layer.load_error.is_none(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(layer_type: &str, max_distance_km: f64) -> InfrastructureLayerConfig {
        InfrastructureLayerConfig {
            layer_type: layer_type.to_string(),
            display_name: layer_type.to_uppercase(),
            files: vec![],
            max_distance_km,
        }
    }

    fn point_feature(lat: f64, lng: f64, name: &str) -> SourceFeature {
        let mut properties = serde_json::Map::new();
        properties.insert("nome".to_string(), json!(name));
        properties.insert("capacity_mva".to_string(), json!(150));
        SourceFeature {
            id: name.to_string(),
            geometry: Geometry::Point(geo::Point::new(lng, lat)),
            properties,
        }
    }

    fn names() -> Vec<String> {
        vec!["nome".to_string()]
    }

    #[test]
    fn test_nearest_within_ceiling() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let layer = InfrastructureLayer::from_features(
            &config("substation", 50.0),
            vec![
                point_feature(-22.6, -47.3, "Near"),
                point_feature(-23.5, -46.6, "Far"),
            ],
            &projection,
            &names(),
        );
        let finder = InfrastructureFinder::new(vec![layer]);

        let matches = finder.find_nearest(&projection, &Point::new(-22.5, -47.3)).unwrap();
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!(m.found);
        assert_eq!(m.name.as_deref(), Some("Near"));
        let distance = m.distance_km.unwrap();
        assert!((distance - 11.07).abs() < 0.2, "distance was {}", distance);
        let props = m.properties.as_ref().unwrap();
        assert_eq!(props.additional_properties["capacity_mva"], json!(150));
    }

    #[test]
    fn test_beyond_ceiling_keeps_distance() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let layer = InfrastructureLayer::from_features(
            &config("ete", 5.0),
            vec![point_feature(-22.6, -47.3, "Plant")],
            &projection,
            &names(),
        );
        let finder = InfrastructureFinder::new(vec![layer]);

        let m = &finder.find_nearest(&projection, &Point::new(-22.5, -47.3)).unwrap()[0];
        assert!(!m.found);
        assert!(m.distance_km.unwrap() > 5.0);
        assert!(m.properties.is_none());
        assert!(m.name.is_none());
        assert!(m.note.is_some());
    }

    #[test]
    fn test_line_layer_distance_zero_on_crossing() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let road = SourceFeature {
            id: "sp-304".to_string(),
            geometry: Geometry::LineString(geo::LineString::from(vec![
                (-47.5, -22.5),
                (-47.1, -22.5),
            ])),
            properties: serde_json::Map::new(),
        };
        let layer =
            InfrastructureLayer::from_features(&config("railway", 50.0), vec![road], &projection, &names());

        // Nearest point lies on the line itself
        let m = &InfrastructureFinder::new(vec![layer])
            .find_nearest(&projection, &Point::new(-22.5, -47.3))
            .unwrap()[0];
        assert!(m.found);
        assert!(m.distance_km.unwrap() < 0.1);
        assert_eq!(m.name.as_deref(), Some("RAILWAY"), "falls back to display name");
    }

    #[test]
    fn test_failed_layer_is_isolated() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let ok = InfrastructureLayer::from_features(
            &config("substation", 50.0),
            vec![point_feature(-22.6, -47.3, "Near")],
            &projection,
            &names(),
        );
        let broken = InfrastructureLayer::unavailable(&config("gas_pipeline", 100.0), "file missing");
        let finder = InfrastructureFinder::new(vec![broken, ok]);

        let matches = finder.find_nearest(&projection, &Point::new(-22.5, -47.3)).unwrap();
        assert_eq!(matches[0].error.as_deref(), Some("file missing"));
        assert!(!matches[0].found);
        assert!(matches[1].found);

        let summaries = finder.summaries();
        assert!(!summaries[0].available);
        assert_eq!(summaries[1].feature_count, 1);
    }

    #[test]
    fn test_unprojectable_feature_is_skipped() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let layer = InfrastructureLayer::from_features(
            &config("substation", 50.0),
            vec![
                point_feature(f64::NAN, f64::NAN, "Broken"),
                point_feature(-22.6, -47.3, "Near"),
            ],
            &projection,
            &names(),
        );
        assert_eq!(layer.len(), 1);
        assert!(layer.load_error().is_none());

        let m = &InfrastructureFinder::new(vec![layer])
            .find_nearest(&projection, &Point::new(-22.5, -47.3))
            .unwrap()[0];
        assert!(m.found);
        assert_eq!(m.name.as_deref(), Some("Near"));
    }

    #[test]
    fn test_empty_layer_reports_note() {
        let projection = ProjectionService::sao_paulo().unwrap();
        let layer =
            InfrastructureLayer::from_features(&config("ete", 30.0), vec![], &projection, &names());
        let m = &InfrastructureFinder::new(vec![layer])
            .find_nearest(&projection, &Point::new(-22.5, -47.3))
            .unwrap()[0];
        assert!(!m.found);
        assert!(m.distance_km.is_none());
        assert!(m.note.is_some());
    }
}
