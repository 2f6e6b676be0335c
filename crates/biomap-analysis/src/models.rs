use biomap_core::models::{AnalysisRequest, MatchedPolygon};
use biomap_geo::InfrastructureMatch;
use biomap_raster::ZonalStatsResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::biogas::BiogasPotential;

/// How a radius compares with the useful collection range for a plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadiusRecommendation {
    Optimal,
    Acceptable,
    Excessive,
}

impl RadiusRecommendation {
    pub fn for_radius(radius_km: f64) -> Self {
        if radius_km <= 20.0 {
            Self::Optimal
        } else if radius_km <= 30.0 {
            Self::Acceptable
        } else {
            Self::Excessive
        }
    }
}

/// Sections computed for one analysis.
///
/// A section that was switched off is `None`; a section that failed carries
/// its own `error` so the rest of the report stays usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub buffer_geometry: geojson::Geometry,
    pub municipalities: Vec<MatchedPolygon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipalities_error: Option<String>,
    pub biogas_potential: Option<BiogasPotential>,
    pub land_use: Option<ZonalStatsResult>,
    pub infrastructure: Option<Vec<InfrastructureMatch>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_area_km2: f64,
    pub total_municipalities: usize,
    pub total_population: u64,
    pub total_biogas_m3_year: f64,
    pub energy_potential_mwh_year: f64,
    pub radius_recommendation: RadiusRecommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub coordinate_system: String,
    pub buffer_projection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub request: AnalysisRequest,
    pub results: AnalysisResults,
    pub summary: AnalysisSummary,
    pub metadata: AnalysisMetadata,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub from_cache: bool,
}

/// Display label of a CRS code used in report metadata.
pub fn crs_label(epsg: u32) -> String {
    match epsg {
        4326 => "WGS84 (EPSG:4326)".to_string(),
        4674 => "SIRGAS 2000 (EPSG:4674)".to_string(),
        31982 => "SIRGAS 2000 / UTM 22S (EPSG:31982)".to_string(),
        31983 => "SIRGAS 2000 / UTM 23S (EPSG:31983)".to_string(),
        31984 => "SIRGAS 2000 / UTM 24S (EPSG:31984)".to_string(),
        other => format!("EPSG:{}", other),
    }
}
