//! CRS detection for layer files and reprojection to EPSG:4326.

use biomap_core::error::Result;
use biomap_core::models::SourceFeature;
use biomap_geo::ProjectionService;

pub const WGS84: u32 = 4326;

/// ESRI-style WKT names that carry no AUTHORITY clause
const KNOWN_WKT_NAMES: &[(&str, u32)] = &[
    ("SIRGAS_2000_UTM_Zone_22S", 31982),
    ("SIRGAS_2000_UTM_Zone_23S", 31983),
    ("SIRGAS_2000_UTM_Zone_24S", 31984),
    ("GCS_SIRGAS_2000", 4674),
    ("GCS_SAD_1969", 4618),
    ("GCS_WGS_1984", 4326),
];

/// EPSG code of a `.prj` WKT string, if one can be recognized.
///
/// For projected WKT the outermost AUTHORITY (the last one in the string)
/// names the projected CRS.
pub fn parse_prj_epsg(wkt: &str) -> Option<u32> {
    const AUTHORITY: &str = "AUTHORITY[\"EPSG\",\"";

    if let Some(start) = wkt.rfind(AUTHORITY) {
        let code_start = start + AUTHORITY.len();
        if let Some(end) = wkt[code_start..].find('"') {
            if let Ok(code) = wkt[code_start..code_start + end].parse::<u32>() {
                return Some(code);
            }
        }
    }

    if let Some(start) = wkt.find("EPSG:") {
        let digits: String = wkt[start + 5..]
            .chars()
            .skip_while(|c| *c == ':')
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(code) = digits.parse::<u32>() {
            return Some(code);
        }
    }

    // PROJCS names come first, so test them before the datum names
    KNOWN_WKT_NAMES
        .iter()
        .find(|(name, _)| wkt.contains(name))
        .map(|(_, code)| *code)
}

/// EPSG code of a GeoJSON `crs` member (`EPSG:4674`, `urn:ogc:def:crs:EPSG::4674`).
pub fn parse_geojson_crs(crs: &serde_json::Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(WGS84);
    }
    name.rsplit(':').next()?.parse().ok()
}

/// Bring features into EPSG:4326. Features already there pass through.
pub fn reproject_to_wgs84(features: Vec<SourceFeature>, source_epsg: u32) -> Result<Vec<SourceFeature>> {
    if source_epsg == WGS84 {
        return Ok(features);
    }

    tracing::debug!(from = source_epsg, count = features.len(), "Reprojecting layer to EPSG:4326");
    // The "metric" side of the service is the source CRS here
    let projection = ProjectionService::new(WGS84, source_epsg)?;
    features
        .into_iter()
        .map(|feature| -> Result<SourceFeature> {
            Ok(SourceFeature {
                geometry: projection.geometry_to_geographic(&feature.geometry)?,
                ..feature
            })
        })
        .collect()
}
