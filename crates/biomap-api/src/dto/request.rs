use biomap_core::models::{AnalysisOptions, AnalysisRequest, Point};
use serde::Deserialize;

fn default_radius_km() -> f64 {
    20.0
}

/// Proximity analysis request body
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalyzeRequest {
    pub fn to_analysis_request(&self) -> AnalysisRequest {
        AnalysisRequest::new(Point::new(self.latitude, self.longitude), self.radius_km)
            .with_options(self.options)
    }
}

/// Point query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"latitude": -22.5, "longitude": -47.3}"#).unwrap();
        let analysis = request.to_analysis_request();
        assert_eq!(analysis.radius_km, 20.0);
        assert_eq!(analysis.point, Point::new(-22.5, -47.3));
        assert_eq!(analysis.options, AnalysisOptions::default());
    }

    #[test]
    fn test_legacy_option_names() {
        let request: AnalyzeRequest = serde_json::from_str(
            r#"{"latitude": -22.5, "longitude": -47.3, "radius_km": 30,
                "options": {"include_mapbiomas": false, "include_biogas_potential": true}}"#,
        )
        .unwrap();
        assert!(!request.options.include_land_use);
        assert!(request.options.include_attributes);
        assert!(request.options.include_infrastructure);
    }
}
