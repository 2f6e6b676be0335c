//! Startup loading of the polygon layer, attribute table and infrastructure layers.

use std::path::Path;
use std::sync::Arc;

use biomap_core::config::{FieldConfig, InfrastructureLayerConfig};
use biomap_core::error::Result;
use biomap_core::models::{AttributeRecord, SourceFeature};
use biomap_core::ports::AttributeStore;
use biomap_geo::{InfrastructureFinder, InfrastructureLayer, PolygonLayer, ProjectionService};

use crate::attributes::{CsvAttributeStore, MemoryAttributeStore};
use crate::formats::open_feature_source;

/// Read the administrative polygon layer. No path gives an empty layer.
pub fn load_polygon_layer(path: Option<&Path>, fields: &FieldConfig) -> Result<PolygonLayer> {
    let Some(path) = path else {
        tracing::warn!("No polygon layer configured, intersection results will be empty");
        return Ok(PolygonLayer::empty());
    };

    let source = open_feature_source(path)?;
    let features = source.load()?;
    let layer = PolygonLayer::from_source_features(features, fields);
    tracing::info!(source = %source.describe(), polygons = layer.len(), "Polygon layer loaded");
    Ok(layer)
}

/// Attribute store for the polygon layer.
///
/// A configured CSV wins. Without one, numeric properties of the polygons
/// themselves are used, so a layer that already carries its figures works alone.
pub fn load_attribute_store(
    path: Option<&Path>,
    layer: &PolygonLayer,
    fields: &FieldConfig,
) -> Result<Arc<dyn AttributeStore>> {
    match path {
        Some(path) => Ok(Arc::new(CsvAttributeStore::from_path(path, fields)?)),
        None => {
            let store = MemoryAttributeStore::from_records(layer.features().iter().map(|feature| {
                let mut record = AttributeRecord::new(feature.name.clone());
                record.external_code = feature.external_code.clone();
                for (key, value) in &feature.properties {
                    if let Some(number) = value.as_f64() {
                        record.values.insert(key.clone(), number);
                    }
                }
                record
            }));
            tracing::debug!(rows = store.len(), "Attributes taken from polygon properties");
            Ok(Arc::new(store))
        }
    }
}

/// Build every configured infrastructure layer.
///
/// A layer whose files all fail becomes an unavailable placeholder; a layer
/// with some readable files keeps what it could read.
pub fn load_infrastructure(
    configs: &[InfrastructureLayerConfig],
    base_dir: &Path,
    projection: &ProjectionService,
    fields: &FieldConfig,
) -> InfrastructureFinder {
    let layers = configs
        .iter()
        .map(|config| load_layer(config, base_dir, projection, fields))
        .collect();
    InfrastructureFinder::new(layers)
}

fn load_layer(
    config: &InfrastructureLayerConfig,
    base_dir: &Path,
    projection: &ProjectionService,
    fields: &FieldConfig,
) -> InfrastructureLayer {
    let paths = config.resolve_paths(base_dir);
    let mut features: Vec<SourceFeature> = Vec::new();
    let mut errors = Vec::new();

    for path in &paths {
        let loaded = open_feature_source(path).and_then(|source| source.load());
        match loaded {
            Ok(mut batch) => {
                // Keep ids unique across merged files
                let prefix = path.file_stem().and_then(|s| s.to_str()).unwrap_or("layer");
                for feature in &mut batch {
                    feature.id = format!("{}:{}", prefix, feature.id);
                }
                features.extend(batch);
            }
            Err(e) => {
                tracing::warn!(layer = %config.layer_type, path = %path.display(), error = %e, "Infrastructure source failed");
                errors.push(e.to_string());
            }
        }
    }

    if !paths.is_empty() && errors.len() == paths.len() {
        return InfrastructureLayer::unavailable(config, errors.join("; "));
    }

    InfrastructureLayer::from_features(config, features, projection, &fields.infrastructure_name)
}
