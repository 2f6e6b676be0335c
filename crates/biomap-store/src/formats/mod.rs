//! Vector layer readers selected by file extension.

use std::path::Path;

use biomap_core::error::{BiomapError, Result};
use biomap_core::ports::FeatureSource;

pub mod geojson;
pub mod shapefile;

pub use self::geojson::GeoJsonSource;
pub use self::shapefile::ShapefileSource;

/// Pick a reader for `path` from its extension.
pub fn open_feature_source(path: &Path) -> Result<Box<dyn FeatureSource>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "shp" => Ok(Box::new(ShapefileSource::new(path))),
        "geojson" | "json" => Ok(Box::new(GeoJsonSource::new(path))),
        other => Err(BiomapError::Format {
            format: "layer".to_string(),
            path: path.to_path_buf(),
            message: format!("unsupported layer extension '{}'", other),
        }),
    }
}

/// Dataset name from the file stem.
pub(crate) fn layer_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_selection() {
        assert!(open_feature_source(Path::new("data/SP_Municipios_2024.shp")).is_ok());
        assert!(open_feature_source(Path::new("data/ETEs.GeoJSON")).is_ok());
        assert!(matches!(
            open_feature_source(Path::new("data/roads.kml")),
            Err(BiomapError::Format { .. })
        ));
    }

    #[test]
    fn test_layer_name() {
        assert_eq!(layer_name(Path::new("/data/Subestacoes_Energia.shp")), "Subestacoes_Energia");
    }
}
