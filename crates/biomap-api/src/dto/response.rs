use biomap_analysis::{CacheStats, RadiusRecommendation};
use biomap_core::models::{BoundingBox, LandUseClass};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub raster_available: bool,
    pub polygon_count: usize,
}

impl HealthResponse {
    pub fn ok(raster_available: bool, polygon_count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            raster_available,
            polygon_count,
        }
    }
}

/// Service region in latitude/longitude terms
#[derive(Debug, Serialize)]
pub struct RegionBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl From<BoundingBox> for RegionBounds {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            min_lat: bbox.south,
            max_lat: bbox.north,
            min_lng: bbox.west,
            max_lng: bbox.east,
        }
    }
}

/// Point validation response
#[derive(Debug, Serialize)]
pub struct ValidatePointResponse {
    pub valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub within_region: bool,
    pub warnings: Vec<String>,
    pub bounds: RegionBounds,
}

/// One radius band with its guidance
#[derive(Debug, Serialize)]
pub struct RadiusBand {
    pub range: String,
    pub recommendation: RadiusRecommendation,
    pub color: String,
    pub description: String,
    pub economic_viability: String,
    pub transport_cost: String,
}

impl RadiusBand {
    fn new(
        range: &str,
        recommendation: RadiusRecommendation,
        color: &str,
        description: &str,
        economic_viability: &str,
        transport_cost: &str,
    ) -> Self {
        Self {
            range: range.to_string(),
            recommendation,
            color: color.to_string(),
            description: description.to_string(),
            economic_viability: economic_viability.to_string(),
            transport_cost: transport_cost.to_string(),
        }
    }
}

/// Radius guidance response
#[derive(Debug, Serialize)]
pub struct RadiusRecommendationsResponse {
    pub default_radius_km: f64,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    pub bands: Vec<RadiusBand>,
}

impl RadiusRecommendationsResponse {
    pub fn new(min_radius_km: f64, max_radius_km: f64) -> Self {
        Self {
            default_radius_km: 20.0,
            min_radius_km,
            max_radius_km,
            bands: vec![
                RadiusBand::new(
                    "10-20",
                    RadiusRecommendation::Optimal,
                    "#22C55E",
                    "Raio ótimo para coleta de biomassa",
                    "Alta",
                    "Baixo",
                ),
                RadiusBand::new(
                    "21-30",
                    RadiusRecommendation::Acceptable,
                    "#EAB308",
                    "Máximo economicamente viável",
                    "Média",
                    "Moderado",
                ),
                RadiusBand::new(
                    "31-50",
                    RadiusRecommendation::Excessive,
                    "#EF4444",
                    "Apenas casos excepcionais",
                    "Baixa",
                    "Alto",
                ),
            ],
        }
    }
}

/// Infrastructure layer listing entry
#[derive(Debug, Serialize)]
pub struct InfrastructureTypeInfo {
    pub layer_type: String,
    pub display_name: String,
    pub description: String,
    pub max_distance_km: f64,
    pub feature_count: usize,
    pub available: bool,
}

/// Infrastructure layer listing response
#[derive(Debug, Serialize)]
pub struct InfrastructureTypesResponse {
    pub layers: Vec<InfrastructureTypeInfo>,
    pub total_layers: usize,
}

/// Land-use raster metadata response
#[derive(Debug, Serialize)]
pub struct RasterMetadataResponse {
    pub name: String,
    pub year: u16,
    pub available: bool,
    pub source: String,
    pub bounds: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    pub tile_size: u32,
    pub zoom_range: [u8; 2],
    pub classes: Vec<LandUseClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raster extent response
#[derive(Debug, Serialize)]
pub struct BoundsResponse {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub crs: String,
    /// `raster` or `default`
    pub source: String,
}

/// Land-use legend response
#[derive(Debug, Serialize)]
pub struct ClassesResponse {
    pub year: u16,
    pub classes: Vec<LandUseClass>,
    pub total_classes: usize,
}

/// Cache statistics response
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub proximity: CacheStats,
    pub tiles: CacheStats,
}
