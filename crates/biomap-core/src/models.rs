pub mod feature;
pub mod land_use;
pub mod point;
pub mod raster;
pub mod request;

pub use feature::{AttributeRecord, MatchedPolygon, PolygonFeature, SourceFeature};
pub use land_use::{LandUseCategory, LandUseClass, LandUseTable};
pub use point::{BoundingBox, MetricPoint, Point};
pub use raster::{sample_to_class, GeoTransform, PixelWindow, RasterMetadata, RasterWindow};
pub use request::{AnalysisOptions, AnalysisRequest};
