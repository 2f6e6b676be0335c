//! Port trait definitions
//!
//! These traits define the collaborators the analysis kernel consumes.

pub mod attributes;
pub mod features;
pub mod raster;

pub use attributes::AttributeStore;
pub use features::FeatureSource;
pub use raster::{bounding_window, RasterBackend};
