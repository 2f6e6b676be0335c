//! Biomap Store - Vector layer readers and tabular attribute stores
//!
//! Readers implement [`biomap_core::ports::FeatureSource`] and always hand
//! geometries back in EPSG:4326. Attribute stores implement
//! [`biomap_core::ports::AttributeStore`].

pub mod attributes;
pub mod crs;
pub mod formats;
pub mod loader;

pub use attributes::{CsvAttributeStore, MemoryAttributeStore};
pub use formats::{open_feature_source, GeoJsonSource, ShapefileSource};
pub use loader::{load_attribute_store, load_infrastructure, load_polygon_layer};
