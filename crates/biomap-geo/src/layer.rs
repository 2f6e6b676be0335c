//! Read-only polygon layer with an envelope index.

use biomap_core::config::FieldConfig;
use biomap_core::models::{BoundingBox, PolygonFeature, SourceFeature};
use geo::{BoundingRect, Geometry, MultiPolygon};
use rstar::{RTree, RTreeObject, AABB};

/// Position of a feature in the layer plus its bounding box
struct LayerEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for LayerEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Administrative polygons shared across requests without locking.
pub struct PolygonLayer {
    features: Vec<PolygonFeature>,
    tree: RTree<LayerEntry>,
}

impl std::fmt::Debug for PolygonLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonLayer").field("features", &self.features.len()).finish()
    }
}

impl PolygonLayer {
    /// Build a layer, skipping features whose geometry has no extent.
    pub fn new(features: Vec<PolygonFeature>) -> Self {
        let mut kept = Vec::with_capacity(features.len());
        let mut entries = Vec::with_capacity(features.len());

        for feature in features {
            match feature.geometry.bounding_rect() {
                Some(rect) => {
                    entries.push(LayerEntry {
                        index: kept.len(),
                        envelope: AABB::from_corners(
                            [rect.min().x, rect.min().y],
                            [rect.max().x, rect.max().y],
                        ),
                    });
                    kept.push(feature);
                }
                None => tracing::warn!(feature_id = %feature.id, "Skipping empty polygon"),
            }
        }

        Self {
            features: kept,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Convert raw features, resolving name and code through the configured
    /// property names. Non-polygonal geometries are dropped.
    pub fn from_source_features(features: Vec<SourceFeature>, fields: &FieldConfig) -> Self {
        let total = features.len();
        let polygons: Vec<PolygonFeature> = features
            .into_iter()
            .filter_map(|feature| {
                let geometry = match to_multipolygon(&feature.geometry) {
                    Some(g) => g,
                    None => {
                        tracing::warn!(feature_id = %feature.id, "Skipping non-polygonal feature");
                        return None;
                    }
                };
                let name = feature
                    .property_str(&fields.polygon_name)
                    .unwrap_or_else(|| feature.id.clone());
                let external_code = feature.property_str(&fields.polygon_code);
                Some(PolygonFeature {
                    id: feature.id,
                    name,
                    external_code,
                    geometry,
                    properties: feature.properties,
                })
            })
            .collect();

        if polygons.len() < total {
            tracing::info!(kept = polygons.len(), total, "Polygon layer filtered");
        }
        Self::new(polygons)
    }

    /// Features whose envelope overlaps `bbox`, in layer order.
    pub fn candidates(&self, bbox: &BoundingBox) -> Vec<&PolygonFeature> {
        let query = AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north]);
        let mut indices: Vec<usize> =
            self.tree.locate_in_envelope_intersecting(&query).map(|e| e.index).collect();
        indices.sort_unstable();
        indices.into_iter().map(|i| &self.features[i]).collect()
    }

    pub fn features(&self) -> &[PolygonFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn to_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let multi = match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::GeometryCollection(gc) => MultiPolygon::new(
            gc.iter()
                .filter_map(to_multipolygon)
                .flat_map(|mp| mp.0)
                .collect(),
        ),
        _ => return None,
    };
    if multi.0.iter().all(|p| p.exterior().0.len() < 4) {
        return None;
    }
    Some(multi)
}
