//! Biomap Geo - Projection, buffering, and vector proximity
//!
//! All measurements are taken in the metric CRS of the [`ProjectionService`];
//! intersection predicates run on lon/lat geometries.

pub mod buffer;
pub mod intersection;
pub mod layer;
pub mod projection;
pub mod proximity;

pub use buffer::{build_buffer, Buffer, MIN_SEGMENTS};
pub use intersection::find_intersecting;
pub use layer::PolygonLayer;
pub use projection::ProjectionService;
pub use proximity::{
    InfrastructureFinder, InfrastructureLayer, InfrastructureMatch, InfrastructureProperties,
    LayerSummary,
};
