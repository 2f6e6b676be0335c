use crate::error::Result;
use crate::models::SourceFeature;

/// Reader for a vector layer (polygons, lines or points).
///
/// Geometries are returned in the geographic CRS; readers reproject on load.
pub trait FeatureSource: Send + Sync {
    /// Human-readable source description
    fn describe(&self) -> String;

    /// Load every feature of the layer
    fn load(&self) -> Result<Vec<SourceFeature>>;
}
